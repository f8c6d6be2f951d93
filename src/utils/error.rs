use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJsonError(#[from] geojson::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Missing geometry")]
    MissingGeometry,

    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Earth Engine request failed ({status}): {message}")]
    RemoteError { status: u16, message: String },

    #[error("Credential error: {message}")]
    CredentialError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Input,
    Remote,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImpactError::ApiError(_) => ErrorCategory::Network,
            ImpactError::ConfigError { .. }
            | ImpactError::ConfigValidationError { .. }
            | ImpactError::InvalidConfigValueError { .. }
            | ImpactError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ImpactError::MissingGeometry
            | ImpactError::InvalidGeometry { .. }
            | ImpactError::InvalidRequest { .. }
            | ImpactError::GeoJsonError(_) => ErrorCategory::Input,
            ImpactError::RemoteError { .. } | ImpactError::CredentialError { .. } => {
                ErrorCategory::Remote
            }
            ImpactError::IoError(_) | ImpactError::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Remote => ErrorSeverity::Medium,
            ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// HTTP status used when the error reaches a client.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Input => 400,
            _ => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImpactError::ApiError(_) => "無法連線到 Earth Engine 服務".to_string(),
            ImpactError::RemoteError { status, .. } => {
                format!("Earth Engine 回傳錯誤 (HTTP {})", status)
            }
            ImpactError::MissingConfigError { field } => format!("缺少必要設定: {}", field),
            ImpactError::InvalidConfigValueError { field, reason, .. } => {
                format!("設定值無效 ({}): {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ImpactError::ApiError(_) => "Check network connectivity and the earth_engine.endpoint setting",
            ImpactError::RemoteError { status: 401, .. }
            | ImpactError::RemoteError { status: 403, .. } => {
                "Refresh the Earth Engine access token and verify project permissions"
            }
            ImpactError::CredentialError { .. } => {
                "Set earth_engine.access_token, or run on Google Cloud with a service account attached"
            }
            ImpactError::RemoteError { status: 429, .. } => "Reduce request rate or raise retry_delay_seconds",
            ImpactError::RemoteError { .. } => "Retry later; the platform may be overloaded",
            ImpactError::MissingGeometry | ImpactError::InvalidGeometry { .. } => {
                "Send a GeoJSON Polygon or MultiPolygon in WGS84 coordinates"
            }
            ImpactError::ConfigError { .. }
            | ImpactError::ConfigValidationError { .. }
            | ImpactError::InvalidConfigValueError { .. }
            | ImpactError::MissingConfigError { .. } => "Review the TOML configuration and environment variables",
            _ => "Check the service logs for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, ImpactError>;
