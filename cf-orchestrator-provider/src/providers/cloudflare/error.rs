//! Cloudflare error mapping

use crate::error::GatewayError;
use crate::traits::{ErrorContext, ErrorMapper, RawApiError};

use super::CloudflareGateway;

const UNKNOWN: &str = "<unknown>";

/// Cloudflare error code mapping
/// Reference: <https://developers.cloudflare.com/fundamentals/api/troubleshooting/>
impl ErrorMapper for CloudflareGateway {
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> GatewayError {
        match raw.code.as_deref() {
            // 6003: Invalid request headers
            // 6103: Invalid format for X-Auth-Key header
            // 6111: Invalid format for Authorization header
            // 9109: Unauthorized to access requested resource
            // 10000: Authentication error
            Some("6003" | "6103" | "6111" | "9109" | "10000") => {
                GatewayError::InvalidCredentials {
                    raw_message: Some(raw.message),
                }
            }

            // 1001: Invalid zone identifier
            // 7000: No route for that URI
            // 7003: Could not route to /path, perhaps your object identifier is invalid?
            Some("1001" | "7000" | "7003") => GatewayError::ZoneNotFound {
                zone: context.zone.unwrap_or_else(|| UNKNOWN.to_string()),
                raw_message: Some(raw.message),
            },

            // 81044: Record does not exist
            Some("81044") => GatewayError::RecordNotFound {
                record_id: context.record_id.unwrap_or_else(|| UNKNOWN.to_string()),
                raw_message: Some(raw.message),
            },

            // 1007: Invalid value for zone setting
            // 9041: This DNS record cannot be proxied
            // 20021: Filter expression parse error
            Some(code @ ("1007" | "9041" | "20021")) => {
                let param = match code {
                    "1007" => "value",
                    "9041" => "proxied",
                    _ => "expression",
                };
                GatewayError::InvalidParameter {
                    param: param.to_string(),
                    detail: raw.message,
                }
            }

            // 20100: Rule quota for the plan reached
            // 81045: Record quota exceeded
            Some("20100" | "81045") => GatewayError::QuotaExceeded {
                raw_message: Some(raw.message),
            },

            _ => self.unknown_error(raw),
        }
    }
}

impl CloudflareGateway {
    /// Code-based mapping first, then HTTP status fallbacks for codes we don't know.
    pub(crate) fn map_error_with_status(
        &self,
        raw: RawApiError,
        status: u16,
        context: ErrorContext,
    ) -> GatewayError {
        let mapped = self.map_error(raw.clone(), context.clone());
        if !matches!(mapped, GatewayError::Unknown { .. }) {
            return mapped;
        }

        match status {
            401 => GatewayError::InvalidCredentials {
                raw_message: Some(raw.message),
            },
            403 => GatewayError::PermissionDenied {
                raw_message: Some(raw.message),
            },
            404 => {
                if let Some(rule_id) = context.rule_id {
                    GatewayError::RuleNotFound {
                        rule_id,
                        raw_message: Some(raw.message),
                    }
                } else if let Some(record_id) = context.record_id {
                    GatewayError::RecordNotFound {
                        record_id,
                        raw_message: Some(raw.message),
                    }
                } else {
                    GatewayError::ZoneNotFound {
                        zone: context.zone.unwrap_or_else(|| UNKNOWN.to_string()),
                        raw_message: Some(raw.message),
                    }
                }
            }
            _ => mapped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> CloudflareGateway {
        CloudflareGateway::new("test-token").unwrap()
    }

    #[test]
    fn auth_codes_map_to_invalid_credentials() {
        let g = gateway();
        for code in ["6003", "6103", "6111", "9109", "10000"] {
            let err = g.map_error(RawApiError::with_code(code, "auth"), ErrorContext::default());
            assert!(
                matches!(err, GatewayError::InvalidCredentials { .. }),
                "code {code}: {err:?}"
            );
        }
    }

    #[test]
    fn zone_codes_use_context() {
        let g = gateway();
        let err = g.map_error(
            RawApiError::with_code("7003", "could not route"),
            ErrorContext::zone("example.com"),
        );
        assert!(matches!(
            err,
            GatewayError::ZoneNotFound { zone, .. } if zone == "example.com"
        ));
    }

    #[test]
    fn record_not_found_default_context() {
        let g = gateway();
        let err = g.map_error(
            RawApiError::with_code("81044", "record does not exist"),
            ErrorContext::default(),
        );
        assert!(matches!(
            err,
            GatewayError::RecordNotFound { record_id, .. } if record_id == "<unknown>"
        ));
    }

    #[test]
    fn expression_error_is_invalid_parameter() {
        let g = gateway();
        let err = g.map_error(
            RawApiError::with_code("20021", "filter parsing error"),
            ErrorContext::default(),
        );
        assert!(matches!(
            err,
            GatewayError::InvalidParameter { param, .. } if param == "expression"
        ));
    }

    #[test]
    fn unknown_code_falls_back() {
        let g = gateway();
        let err = g.map_error(
            RawApiError::with_code("99999", "something unexpected"),
            ErrorContext::default(),
        );
        assert!(matches!(
            err,
            GatewayError::Unknown { raw_code, raw_message }
                if raw_code.as_deref() == Some("99999") && raw_message == "something unexpected"
        ));
    }

    #[test]
    fn status_404_with_rule_context_is_rule_not_found() {
        let g = gateway();
        let err = g.map_error_with_status(
            RawApiError::with_code("10003", "not found"),
            404,
            ErrorContext::rule("zone1", "rule1"),
        );
        assert!(matches!(
            err,
            GatewayError::RuleNotFound { rule_id, .. } if rule_id == "rule1"
        ));
    }

    #[test]
    fn status_403_is_permission_denied() {
        let g = gateway();
        let err = g.map_error_with_status(
            RawApiError::new("forbidden"),
            403,
            ErrorContext::zone("zone1"),
        );
        assert!(matches!(err, GatewayError::PermissionDenied { .. }));
    }

    #[test]
    fn known_code_wins_over_status() {
        let g = gateway();
        let err = g.map_error_with_status(
            RawApiError::with_code("10000", "auth"),
            404,
            ErrorContext::zone("zone1"),
        );
        assert!(matches!(err, GatewayError::InvalidCredentials { .. }));
    }
}
