use std::path::PathBuf;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("silent channel: {channel} channel has zero peak amplitude")]
    SilentChannel { channel: Channel },

    #[error("invalid frame rate: {fps} fps at {sample_rate} Hz gives a frame step below one sample")]
    InvalidFrameRate { fps: u32, sample_rate: u32 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("rasterization fault on frame {index}: {message}")]
    Rasterization { index: u32, message: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job cancelled")]
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Left => f.write_str("left"),
            Channel::Right => f.write_str("right"),
        }
    }
}

impl PipelineError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn raster(index: u32, msg: impl Into<String>) -> Self {
        Self::Rasterization {
            index,
            message: msg.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(PipelineError::decode("x").to_string().starts_with("decode error:"));
        assert!(PipelineError::encoding("x").to_string().starts_with("encoding error:"));
        assert!(PipelineError::config("x").to_string().starts_with("invalid config:"));
        assert!(PipelineError::raster(7, "x")
            .to_string()
            .contains("frame 7"));
    }

    #[test]
    fn silent_channel_names_the_channel() {
        let err = PipelineError::SilentChannel {
            channel: Channel::Right,
        };
        assert!(err.to_string().contains("right channel"));
    }

    #[test]
    fn io_preserves_source() {
        let err = PipelineError::io("/tmp/x", std::io::Error::other("boom"));
        assert!(err.to_string().contains("boom"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
