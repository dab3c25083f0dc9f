use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static ZIP_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{5}-?[0-9]{3}$").unwrap());

/// Address returned by ViaCEP, renamed to the contact vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CepAddress {
    pub zip_code: String,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub complement: String,
}

#[derive(Debug, PartialEq)]
pub enum ViaCepError {
    NotFound,
    Upstream(String),
}

impl std::fmt::Display for ViaCepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViaCepError::NotFound => write!(f, "CEP not found"),
            ViaCepError::Upstream(msg) => write!(f, "ViaCEP request failed: {msg}"),
        }
    }
}

pub fn is_valid_zip_code(zip_code: &str) -> bool {
    ZIP_CODE_RE.is_match(zip_code)
}

pub struct ViaCepClient {
    client: reqwest::Client,
    base_url: String,
}

impl ViaCepClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up a CEP. Callers validate the format with [`is_valid_zip_code`].
    pub async fn lookup(&self, zip_code: &str) -> Result<CepAddress, ViaCepError> {
        let digits: String = zip_code.chars().filter(char::is_ascii_digit).collect();
        let url = format!("{}/{digits}/json/", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ViaCepError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ViaCepError::Upstream(format!("HTTP {status}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ViaCepError::Upstream(format!("invalid JSON: {e}")))?;

        parse_response(&body)
    }
}

fn parse_response(body: &Value) -> Result<CepAddress, ViaCepError> {
    // ViaCEP signals an unknown CEP with 200 and `"erro": true` (older
    // deployments send the string "true").
    if !body["erro"].is_null() {
        return Err(ViaCepError::NotFound);
    }

    let field = |name: &str| body[name].as_str().unwrap_or_default().to_string();

    let zip_code = field("cep");
    if zip_code.is_empty() {
        return Err(ViaCepError::Upstream("response without cep".to_string()));
    }

    Ok(CepAddress {
        zip_code,
        address: field("logradouro"),
        neighborhood: field("bairro"),
        city: field("localidade"),
        state: field("uf"),
        complement: field("complemento"),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn zip_code_format() {
        assert!(is_valid_zip_code("01310-100"));
        assert!(is_valid_zip_code("01310100"));
        assert!(!is_valid_zip_code("0131-0100"));
        assert!(!is_valid_zip_code("01310-10"));
        assert!(!is_valid_zip_code("abcde-fgh"));
        assert!(!is_valid_zip_code(""));
        // Unicode digits from other scripts are not CEPs
        assert!(!is_valid_zip_code("٠١٣١٠-١٠٠"));
        assert!(!is_valid_zip_code("０１３１０-１００"));
    }

    #[test]
    fn maps_via_cep_fields() {
        let body = json!({
            "cep": "01310-100",
            "logradouro": "Avenida Paulista",
            "complemento": "de 612 a 1510 - lado par",
            "bairro": "Bela Vista",
            "localidade": "São Paulo",
            "uf": "SP",
            "ibge": "3550308"
        });
        assert_eq!(
            parse_response(&body).unwrap(),
            CepAddress {
                zip_code: "01310-100".to_string(),
                address: "Avenida Paulista".to_string(),
                neighborhood: "Bela Vista".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                complement: "de 612 a 1510 - lado par".to_string(),
            }
        );
    }

    #[test]
    fn missing_complement_is_empty() {
        let body = json!({
            "cep": "13010-000", "logradouro": "", "bairro": "Centro",
            "localidade": "Campinas", "uf": "SP"
        });
        assert_eq!(parse_response(&body).unwrap().complement, "");
    }

    #[test]
    fn erro_flag_means_not_found() {
        assert_eq!(parse_response(&json!({ "erro": true })), Err(ViaCepError::NotFound));
        assert_eq!(parse_response(&json!({ "erro": "true" })), Err(ViaCepError::NotFound));
    }
}
