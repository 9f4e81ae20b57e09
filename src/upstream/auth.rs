//! Upstream bearer header selection.

use secrecy::{ExposeSecret, SecretString};

use crate::config::Secrets;
use crate::upstream::transport::Pairs;

/// Which upstream service a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Teams,
    Players,
    Matches,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Teams => "teams",
            Service::Players => "players",
            Service::Matches => "matches",
        }
    }
}

/// Credentials forwarded by the caller of a single report request.
#[derive(Debug, Clone, Default)]
pub struct AuthOverrides {
    /// `X-Api-Authorization`: applies to every upstream.
    pub generic: Option<String>,
    pub teams: Option<String>,
    pub players: Option<String>,
    pub matches: Option<String>,
}

impl AuthOverrides {
    fn for_service(&self, service: Service) -> Option<&str> {
        match service {
            Service::Teams => self.teams.as_deref(),
            Service::Players => self.players.as_deref(),
            Service::Matches => self.matches.as_deref(),
        }
    }
}

/// Configured per-service tokens plus the generic fallback.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    teams: Option<SecretString>,
    players: Option<SecretString>,
    matches: Option<SecretString>,
    fallback: Option<SecretString>,
}

impl TokenSet {
    pub fn from_secrets(secrets: &Secrets) -> Self {
        Self {
            teams: secrets.teams_api_token.clone(),
            players: secrets.players_api_token.clone(),
            matches: secrets.matches_api_token.clone(),
            fallback: secrets.upstream_token.clone(),
        }
    }

    fn for_service(&self, service: Service) -> Option<&SecretString> {
        match service {
            Service::Teams => self.teams.as_ref(),
            Service::Players => self.players.as_ref(),
            Service::Matches => self.matches.as_ref(),
        }
    }

    /// Pick the Authorization header for `service`.
    ///
    /// Priority: per-service override, generic override, per-service
    /// configured token, fallback token. Blank values are skipped.
    pub fn choose_header(&self, service: Service, overrides: &AuthOverrides) -> Pairs {
        let configured = [self.for_service(service), self.fallback.as_ref()];

        let token = [overrides.for_service(service), overrides.generic.as_deref()]
            .into_iter()
            .flatten()
            .chain(configured.into_iter().flatten().map(|s| s.expose_secret()))
            .map(str::trim)
            .find(|t| !t.is_empty());

        match token {
            Some(token) => vec![("Authorization".to_string(), bearer(token))],
            None => Vec::new(),
        }
    }
}

/// Prefix `Bearer ` unless the value already carries it.
pub fn bearer(token: &str) -> String {
    let token = token.trim();
    if token
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "))
    {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Option<SecretString> {
        Some(SecretString::from(s.to_string()))
    }

    fn tokens() -> TokenSet {
        TokenSet {
            teams: secret("teams-env"),
            players: None,
            matches: secret("Bearer matches-env"),
            fallback: secret("global"),
        }
    }

    fn header(pairs: &Pairs) -> Option<&str> {
        pairs.first().map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_bearer_prefix() {
        assert_eq!(bearer("abc"), "Bearer abc");
        assert_eq!(bearer("Bearer abc"), "Bearer abc");
        assert_eq!(bearer("bearer abc"), "bearer abc");
        assert_eq!(bearer("  abc "), "Bearer abc");
    }

    #[test]
    fn test_per_service_override_wins() {
        let overrides = AuthOverrides {
            generic: Some("generic".into()),
            teams: Some("teams-req".into()),
            ..Default::default()
        };
        let h = tokens().choose_header(Service::Teams, &overrides);
        assert_eq!(header(&h), Some("Bearer teams-req"));
    }

    #[test]
    fn test_generic_override_beats_configured_token() {
        let overrides = AuthOverrides {
            generic: Some("generic".into()),
            ..Default::default()
        };
        let h = tokens().choose_header(Service::Teams, &overrides);
        assert_eq!(header(&h), Some("Bearer generic"));
    }

    #[test]
    fn test_configured_then_fallback() {
        let none = AuthOverrides::default();
        assert_eq!(
            header(&tokens().choose_header(Service::Teams, &none)),
            Some("Bearer teams-env")
        );
        assert_eq!(
            header(&tokens().choose_header(Service::Matches, &none)),
            Some("Bearer matches-env")
        );
        assert_eq!(
            header(&tokens().choose_header(Service::Players, &none)),
            Some("Bearer global")
        );
    }

    #[test]
    fn test_blank_override_is_skipped() {
        let overrides = AuthOverrides {
            teams: Some("   ".into()),
            ..Default::default()
        };
        let h = tokens().choose_header(Service::Teams, &overrides);
        assert_eq!(header(&h), Some("Bearer teams-env"));
    }

    #[test]
    fn test_no_token_no_header() {
        let h = TokenSet::default().choose_header(Service::Players, &AuthOverrides::default());
        assert!(h.is_empty());
    }
}
