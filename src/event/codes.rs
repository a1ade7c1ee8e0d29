//! Well-known event codes and the ranges used to classify them.

pub const UNDEFINED_EVENT_CODE: u32 = 0;
pub const UNDEFINED_DETAIL_CODE: u32 = 0;

pub const APPLICATION_CODE_BASE: u32 = 1000;
pub const APPLICATION_START: u32 = 1001;
pub const APPLICATION_SHUTDOWN: u32 = 1002;
pub const APPLICATION_COMPILATION_START: u32 = 1003;
pub const APPLICATION_COMPILATION_END: u32 = 1004;
pub const APPLICATION_HEARTBEAT: u32 = 1005;

pub const REQUEST_CODE_BASE: u32 = 2000;
pub const REQUEST_TRANSACTION_COMPLETE: u32 = 2001;
pub const REQUEST_TRANSACTION_ABORT: u32 = 2002;

pub const ERROR_CODE_BASE: u32 = 3000;
pub const RUNTIME_ERROR_REQUEST_ABORT: u32 = 3001;
pub const RUNTIME_ERROR_VIEW_STATE_FAILURE: u32 = 3002;
pub const RUNTIME_ERROR_VALIDATION_FAILURE: u32 = 3003;
pub const RUNTIME_ERROR_POST_TOO_LARGE: u32 = 3004;
pub const RUNTIME_ERROR_UNHANDLED_EXCEPTION: u32 = 3005;
pub const WEB_ERROR_PARSER_ERROR: u32 = 3006;
pub const WEB_ERROR_COMPILATION_ERROR: u32 = 3007;
pub const WEB_ERROR_CONFIGURATION_ERROR: u32 = 3008;
pub const WEB_ERROR_OTHER_ERROR: u32 = 3009;

pub const AUDIT_CODE_BASE: u32 = 4000;
pub const AUDIT_FORMS_AUTHENTICATION_SUCCESS: u32 = 4001;
pub const AUDIT_MEMBERSHIP_AUTHENTICATION_SUCCESS: u32 = 4002;
pub const AUDIT_URL_AUTHORIZATION_SUCCESS: u32 = 4003;
pub const AUDIT_FILE_AUTHORIZATION_SUCCESS: u32 = 4004;
pub const AUDIT_FORMS_AUTHENTICATION_FAILURE: u32 = 4005;
pub const AUDIT_MEMBERSHIP_AUTHENTICATION_FAILURE: u32 = 4006;
pub const AUDIT_URL_AUTHORIZATION_FAILURE: u32 = 4007;
pub const AUDIT_FILE_AUTHORIZATION_FAILURE: u32 = 4008;
pub const AUDIT_INVALID_VIEW_STATE_FAILURE: u32 = 4009;
pub const AUDIT_UNHANDLED_SECURITY_EXCEPTION: u32 = 4010;
pub const AUDIT_UNHANDLED_ACCESS_EXCEPTION: u32 = 4011;

pub const MISC_CODE_BASE: u32 = 6000;
pub const PROVIDER_INFORMATION: u32 = 6001;

/// First code available to application-defined events.
pub const WEB_EXTENDED_BASE: u32 = 100_000;

/// Returns true for codes reserved by the monitoring system itself.
pub fn is_system_code(code: u32) -> bool {
    code < WEB_EXTENDED_BASE
}

/// Returns true for failure audits (4005..=4011).
pub fn is_failure_audit(code: u32) -> bool {
    (AUDIT_FORMS_AUTHENTICATION_FAILURE..=AUDIT_UNHANDLED_ACCESS_EXCEPTION).contains(&code)
}

/// Inclusive range of event codes matched by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventCodeRange {
    pub start: u32,
    pub end: u32,
}

impl EventCodeRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Matches every code.
    pub const fn all() -> Self {
        Self::new(0, u32::MAX)
    }

    pub const fn single(code: u32) -> Self {
        Self::new(code, code)
    }

    pub fn contains(&self, code: u32) -> bool {
        (self.start..=self.end).contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}
