//! Error types and handling for the weather resolution pipeline

use thiserror::Error;

/// Main error type for the weather gateway
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Request validation errors (dates, ranges, units)
    #[error("Invalid input: {message}")]
    Validation { code: &'static str, message: String },

    /// City identifier not present in the gazetteer
    #[error("City not found: {city}")]
    CityNotFound { city: String },

    /// Operation requires a city on the tracked allow-list
    #[error("City '{city}' is not configured for historical tracking")]
    UntrackedCity { city: String },

    /// Upstream has no data for the coordinates/date
    #[error("No weather data available: {message}")]
    NotFound { message: String },

    /// Upstream network failure, 5xx, rate limit or undecodable response
    #[error("Weather provider error: {message}")]
    Provider { message: String },

    /// Cache or historical store backend failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl WeatherError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error for an out-of-window date
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            code: "INVALID_DATE",
            message: message.into(),
        }
    }

    /// Create a validation error carrying a specific machine code
    pub fn validation_with_code<S: Into<String>>(code: &'static str, message: S) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn city_not_found<S: Into<String>>(city: S) -> Self {
        Self::CityNotFound { city: city.into() }
    }

    pub fn untracked_city<S: Into<String>>(city: S) -> Self {
        Self::UntrackedCity { city: city.into() }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in API error bodies
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            WeatherError::Config { .. } => "CONFIG_ERROR",
            WeatherError::Validation { code, .. } => code,
            WeatherError::CityNotFound { .. } => "CITY_NOT_FOUND",
            WeatherError::UntrackedCity { .. } => "CITY_NOT_TRACKED",
            WeatherError::NotFound { .. } => "LOCATION_NOT_FOUND",
            WeatherError::Provider { .. } => "WEATHER_API_ERROR",
            WeatherError::Storage { .. } => "STORAGE_ERROR",
            WeatherError::Io { .. } => "IO_ERROR",
        }
    }

    /// True for errors caused by the caller's request rather than by a tier
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WeatherError::Validation { .. }
                | WeatherError::CityNotFound { .. }
                | WeatherError::UntrackedCity { .. }
                | WeatherError::NotFound { .. }
        )
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            WeatherError::Validation { message, .. } => format!("Invalid input: {message}"),
            WeatherError::CityNotFound { city } => format!(
                "City '{city}' not found. Try the city,country format (e.g. london,gb)."
            ),
            WeatherError::UntrackedCity { city } => format!(
                "City '{city}' is not configured for historical tracking."
            ),
            WeatherError::NotFound { .. } => {
                "No weather data is available for this location and date.".to_string()
            }
            WeatherError::Provider { .. } => {
                "Unable to reach the weather provider. Please try again later.".to_string()
            }
            WeatherError::Storage { .. } => {
                "Weather storage is temporarily unavailable.".to_string()
            }
            WeatherError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<anyhow::Error> for WeatherError {
    fn from(err: anyhow::Error) -> Self {
        WeatherError::storage(format!("{err:#}"))
    }
}
