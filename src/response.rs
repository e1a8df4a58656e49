//! Response construction.
//!
//! Every outbound [`Response`] is built here and checked against one of two
//! field templates (success, error) before it is handed to the connection
//! layer. A template violation is a programming error, not a client error:
//! rather than propagate it, the builder logs it and falls back to a minimal
//! response so the connection layer always has a well-formed message to send.

use crate::error::Error;
use crate::host_store::HostStatus;
use crate::proto::{
    ErrorType, Response, ResponseStatus, ResultType, ServerInfo, PROTOCOL_VERSION, RESPONSE_TYPE,
};
use crate::registrar::{HostRegistrationResult, RegistrationAction};
use serde::Deserialize;
use std::net::IpAddr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// How much of the optional field set responses carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseDetail {
    /// Only the required fields.
    Minimal,
    /// Plus `result_type`/`error_type`, `hostname`, addresses, `retry_after`.
    #[default]
    Detailed,
    /// Plus a `server_info` block.
    Full,
}

/// Raised by [`ResponseBuilder::validate`] when a candidate response violates
/// its template.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("field {0} is empty")]
    EmptyField(&'static str),
    #[error("field {field} must be {expected}")]
    WrongValue {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field {field} is not allowed on {template} responses")]
    FieldNotAllowed {
        field: &'static str,
        template: &'static str,
    },
    #[error("timestamp is not RFC 3339")]
    BadTimestamp,
}

/// Builds validated success and error responses at a configured detail level.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    detail: ResponseDetail,
    server_info: ServerInfo,
}

impl ResponseBuilder {
    #[must_use]
    pub fn new(detail: ResponseDetail) -> Self {
        Self {
            detail,
            server_info: ServerInfo::default(),
        }
    }

    /// Map a registration outcome to its wire response.
    #[must_use]
    pub fn registration_response(&self, result: &HostRegistrationResult) -> Response {
        match result.action {
            RegistrationAction::Created => self.new_registration(&result.hostname, result.ip_address),
            RegistrationAction::UpdatedIp => self.ip_changed(
                &result.hostname,
                result.ip_address,
                result.previous_ip,
            ),
            RegistrationAction::UpdatedTimestamp => {
                self.heartbeat_refreshed(&result.hostname, result.ip_address)
            }
            RegistrationAction::Reactivated => self.reconnected(
                &result.hostname,
                result.ip_address,
                result.previous_ip,
                result.previous_status,
            ),
            RegistrationAction::Error => self.database_error(Some(&result.hostname)),
        }
    }

    /// Map a request failure to its wire response.
    #[must_use]
    pub fn error_response(&self, err: &Error, hostname: Option<&str>) -> Response {
        match err {
            Error::Framing(msg) => self.build_error(
                ErrorType::FramingError,
                format!("malformed frame: {msg}"),
                None,
                None,
            ),
            Error::Schema(msg) => self.build_error(
                ErrorType::SchemaError,
                format!("invalid message: {msg}"),
                None,
                None,
            ),
            Error::InvalidHostname(_) | Error::InvalidIp(_) | Error::PrivateIp(_) => {
                self.validation_error(err.to_string(), hostname)
            }
            Error::RateLimited {
                hostname,
                retry_after,
            } => self.rate_limit_error(hostname, *retry_after),
            _ => self.database_error(hostname),
        }
    }

    /// Success response for a first-time registration.
    #[must_use]
    pub fn new_registration(&self, hostname: &str, ip: IpAddr) -> Response {
        self.build_success(
            ResultType::NewRegistration,
            hostname,
            ip,
            format!("New host '{hostname}' registered with IP {ip}"),
            None,
            None,
        )
    }

    /// Success response for an accepted IP change while online.
    #[must_use]
    pub fn ip_changed(&self, hostname: &str, ip: IpAddr, previous_ip: Option<IpAddr>) -> Response {
        let message = match previous_ip {
            Some(prev) => format!("Host '{hostname}' IP changed from {prev} to {ip}"),
            None => format!("Host '{hostname}' IP changed to {ip}"),
        };
        self.build_success(ResultType::IpChange, hostname, ip, message, previous_ip, None)
    }

    /// Success response for a heartbeat that only refreshed `last_seen`.
    #[must_use]
    pub fn heartbeat_refreshed(&self, hostname: &str, ip: IpAddr) -> Response {
        self.build_success(
            ResultType::HeartbeatUpdate,
            hostname,
            ip,
            format!("Heartbeat accepted for host '{hostname}'"),
            None,
            None,
        )
    }

    /// Success response for an offline host coming back, with or without a new
    /// IP. `previous_status` is always populated here and nowhere else.
    #[must_use]
    pub fn reconnected(
        &self,
        hostname: &str,
        ip: IpAddr,
        previous_ip: Option<IpAddr>,
        previous_status: Option<HostStatus>,
    ) -> Response {
        self.build_success(
            ResultType::Reconnection,
            hostname,
            ip,
            format!("Host '{hostname}' reconnected with IP {ip}"),
            previous_ip,
            previous_status.or(Some(HostStatus::Offline)),
        )
    }

    /// Error response for a hostname or IP that failed validation.
    #[must_use]
    pub fn validation_error(&self, message: impl Into<String>, hostname: Option<&str>) -> Response {
        self.build_error(ErrorType::ValidationError, message.into(), hostname, None)
    }

    /// Error response for a host store failure. The underlying cause stays in
    /// the server log.
    #[must_use]
    pub fn database_error(&self, hostname: Option<&str>) -> Response {
        self.build_error(
            ErrorType::DatabaseError,
            "temporary storage failure, please retry".to_string(),
            hostname,
            None,
        )
    }

    /// Error response for a hostname over its registration budget.
    #[must_use]
    pub fn rate_limit_error(&self, hostname: &str, retry_after: u64) -> Response {
        self.build_error(
            ErrorType::RateLimitError,
            format!("rate limit exceeded for '{hostname}'"),
            Some(hostname),
            Some(retry_after),
        )
    }

    /// Check a response against its template. Success responses must not carry
    /// error fields and vice versa; both must carry the required five.
    ///
    /// # Errors
    ///
    /// Returns the first [`TemplateError`] found.
    pub fn validate(response: &Response) -> Result<(), TemplateError> {
        if response.version != PROTOCOL_VERSION {
            return Err(TemplateError::WrongValue {
                field: "version",
                expected: PROTOCOL_VERSION,
            });
        }
        if response.message_type != RESPONSE_TYPE {
            return Err(TemplateError::WrongValue {
                field: "type",
                expected: RESPONSE_TYPE,
            });
        }
        if response.message.is_empty() {
            return Err(TemplateError::EmptyField("message"));
        }
        if OffsetDateTime::parse(&response.timestamp, &Rfc3339).is_err() {
            return Err(TemplateError::BadTimestamp);
        }
        match response.status {
            ResponseStatus::Success => {
                if response.error_type.is_some() {
                    return Err(TemplateError::FieldNotAllowed {
                        field: "error_type",
                        template: "success",
                    });
                }
                if response.retry_after.is_some() {
                    return Err(TemplateError::FieldNotAllowed {
                        field: "retry_after",
                        template: "success",
                    });
                }
            }
            ResponseStatus::Error => {
                if response.result_type.is_some() {
                    return Err(TemplateError::FieldNotAllowed {
                        field: "result_type",
                        template: "error",
                    });
                }
                if response.previous_ip.is_some() || response.previous_status.is_some() {
                    return Err(TemplateError::FieldNotAllowed {
                        field: "previous_ip",
                        template: "error",
                    });
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_success(
        &self,
        result_type: ResultType,
        hostname: &str,
        ip: IpAddr,
        message: String,
        previous_ip: Option<IpAddr>,
        previous_status: Option<HostStatus>,
    ) -> Response {
        let mut response = self.required_fields(ResponseStatus::Success, message);
        if self.detail != ResponseDetail::Minimal {
            response.result_type = Some(result_type);
            response.hostname = Some(hostname.to_string());
            response.ip_address = Some(ip);
            response.previous_ip = previous_ip;
            response.previous_status = previous_status;
        }
        self.finish(response)
    }

    fn build_error(
        &self,
        error_type: ErrorType,
        message: String,
        hostname: Option<&str>,
        retry_after: Option<u64>,
    ) -> Response {
        let mut response = self.required_fields(ResponseStatus::Error, message);
        if self.detail != ResponseDetail::Minimal {
            response.error_type = Some(error_type);
            response.hostname = hostname.map(ToString::to_string);
            response.retry_after = retry_after;
        }
        self.finish(response)
    }

    fn required_fields(&self, status: ResponseStatus, message: String) -> Response {
        Response {
            version: PROTOCOL_VERSION.to_string(),
            message_type: RESPONSE_TYPE.to_string(),
            status,
            message,
            timestamp: now_rfc3339(),
            result_type: None,
            error_type: None,
            hostname: None,
            ip_address: None,
            previous_ip: None,
            previous_status: None,
            retry_after: None,
            server_info: None,
        }
    }

    fn finish(&self, mut response: Response) -> Response {
        if self.detail == ResponseDetail::Full {
            response.server_info = Some(self.server_info.clone());
        }
        match Self::validate(&response) {
            Ok(()) => response,
            Err(err) => {
                // Never leaks to the wire as a failure: a template violation
                // here is a bug, and the client still deserves an answer.
                tracing::error!("response failed template validation: {err}");
                let mut fallback =
                    self.required_fields(response.status, response.message.clone());
                if fallback.message.is_empty() {
                    fallback.message = "internal response construction error".to_string();
                }
                fallback
            }
        }
    }
}

fn now_rfc3339() -> String {
    // NB: unwrap is safe: RFC 3339 formatting of the current UTC time cannot
    // fail.
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn new_registration_passes_validation() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let resp = builder.new_registration("host1", ip("203.0.113.5"));

        ResponseBuilder::validate(&resp).unwrap();
        assert_eq!(resp.status, ResponseStatus::Success);
        assert_eq!(resp.result_type, Some(ResultType::NewRegistration));
        assert_eq!(resp.hostname.as_deref(), Some("host1"));
        assert_eq!(resp.ip_address, Some(ip("203.0.113.5")));
        assert!(resp.message.contains("host1"));
    }

    #[test]
    fn minimal_detail_strips_optional_fields() {
        let builder = ResponseBuilder::new(ResponseDetail::Minimal);
        let resp = builder.ip_changed("host1", ip("10.0.0.2"), Some(ip("10.0.0.1")));

        ResponseBuilder::validate(&resp).unwrap();
        assert!(resp.result_type.is_none());
        assert!(resp.hostname.is_none());
        assert!(resp.ip_address.is_none());
        assert!(resp.previous_ip.is_none());
        assert!(resp.server_info.is_none());
    }

    #[test]
    fn full_detail_includes_server_info() {
        let builder = ResponseBuilder::new(ResponseDetail::Full);
        let resp = builder.heartbeat_refreshed("host1", ip("203.0.113.5"));

        let info = resp.server_info.expect("server_info");
        assert_eq!(info.protocol_version, PROTOCOL_VERSION);
        assert_eq!(info.server_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn reconnection_carries_previous_status() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let resp = builder.reconnected(
            "host1",
            ip("10.0.0.2"),
            Some(ip("10.0.0.1")),
            Some(HostStatus::Offline),
        );

        assert_eq!(resp.result_type, Some(ResultType::Reconnection));
        assert_eq!(resp.previous_status, Some(HostStatus::Offline));
        assert_eq!(resp.previous_ip, Some(ip("10.0.0.1")));
    }

    #[test]
    fn ip_change_does_not_carry_previous_status() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let resp = builder.ip_changed("host1", ip("10.0.0.2"), Some(ip("10.0.0.1")));
        assert!(resp.previous_status.is_none());
    }

    #[test]
    fn rate_limit_error_carries_retry_after() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let resp = builder.rate_limit_error("host1", 42);

        ResponseBuilder::validate(&resp).unwrap();
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.error_type, Some(ErrorType::RateLimitError));
        assert_eq!(resp.retry_after, Some(42));
    }

    #[test]
    fn validate_rejects_mixed_templates() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let mut resp = builder.new_registration("host1", ip("203.0.113.5"));
        resp.error_type = Some(ErrorType::ValidationError);

        assert!(matches!(
            ResponseBuilder::validate(&resp),
            Err(TemplateError::FieldNotAllowed { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_timestamp() {
        let builder = ResponseBuilder::new(ResponseDetail::Minimal);
        let mut resp = builder.heartbeat_refreshed("host1", ip("203.0.113.5"));
        resp.timestamp = "yesterday".to_string();

        assert_eq!(
            ResponseBuilder::validate(&resp),
            Err(TemplateError::BadTimestamp)
        );
    }

    #[test]
    fn error_response_maps_rate_limit() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let err = Error::RateLimited {
            hostname: "host1".to_string(),
            retry_after: 7,
        };
        let resp = builder.error_response(&err, Some("host1"));
        assert_eq!(resp.error_type, Some(ErrorType::RateLimitError));
        assert_eq!(resp.retry_after, Some(7));
    }

    #[test]
    fn error_response_hides_storage_cause() {
        let builder = ResponseBuilder::new(ResponseDetail::Detailed);
        let err = Error::Storage("disk on fire".to_string());
        let resp = builder.error_response(&err, Some("host1"));
        assert_eq!(resp.error_type, Some(ErrorType::DatabaseError));
        assert!(!resp.message.contains("disk on fire"));
    }
}
