use clap::ValueEnum;
use std::str::FromStr;

/// Authorization header scheme for an outbound API
#[derive(Clone, PartialEq)]
pub enum Auth {
    /// `Authorization: Token <token>`, used by the Nautobot APIs
    Token(String),
    /// `Authorization: Splunk <token>`, the classic HEC scheme
    Splunk(String),
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// Don't send an Authorization header
    None,
}

impl Auth {
    pub fn new(r#type: &AuthType, token: Option<String>) -> Self {
        match (r#type, token) {
            (AuthType::Token, Some(token)) => Self::Token(token),
            (AuthType::Splunk, Some(token)) => Self::Splunk(token),
            (AuthType::Bearer, Some(token)) => Self::Bearer(token),
            (AuthType::None, _) | _ => Self::None,
        }
    }

    /// Value for the `Authorization` header, if any
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Token(token) => Some(format!("Token {}", token)),
            Self::Splunk(token) => Some(format!("Splunk {}", token)),
            Self::Bearer(token) => Some(format!("Bearer {}", token)),
            Self::None => None,
        }
    }
}

// Never print the token itself
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Auth({})", self)
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => write!(f, "Token"),
            Self::Splunk(_) => write!(f, "Splunk"),
            Self::Bearer(_) => write!(f, "Bearer"),
            Self::None => write!(f, "None"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum AuthType {
    Token,
    Splunk,
    Bearer,
    None,
}

impl FromStr for AuthType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "splunk" => Ok(Self::Splunk),
            "bearer" => Ok(Self::Bearer),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values() {
        assert_eq!(
            Auth::Token("abc".into()).header_value().as_deref(),
            Some("Token abc")
        );
        assert_eq!(
            Auth::Splunk("abc".into()).header_value().as_deref(),
            Some("Splunk abc")
        );
        assert_eq!(
            Auth::Bearer("abc".into()).header_value().as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(Auth::None.header_value(), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let auth = Auth::Splunk("super-secret".into());
        assert_eq!(format!("{:?}", auth), "Auth(Splunk)");
    }

    #[test]
    fn test_auth_type_from_str() {
        assert_eq!("SPLUNK".parse::<AuthType>(), Ok(AuthType::Splunk));
        assert_eq!("bearer".parse::<AuthType>(), Ok(AuthType::Bearer));
        assert!("basic".parse::<AuthType>().is_err());
        assert_eq!(
            Auth::new(&AuthType::Token, None),
            Auth::None,
            "missing token falls back to no auth"
        );
    }
}
