use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("invalid resolution {width}x{height}: both dimensions must be positive")]
    InvalidResolution { width: i64, height: i64 },

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to serialize map: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write output file: {0}")]
    Io(#[from] std::io::Error),
}

pub type MapResult<T> = Result<T, MapError>;
