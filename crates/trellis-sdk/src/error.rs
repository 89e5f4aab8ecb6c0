use thiserror::Error;
use trellis_types::ContainerId;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("container {container} has no field {field:?}")]
    FieldNotFound {
        container: ContainerId,
        field: String,
    },

    #[error(transparent)]
    Spec(#[from] trellis_spec::SpecError),

    #[error(transparent)]
    Container(#[from] trellis_container::ContainerError),

    #[error(transparent)]
    Map(#[from] trellis_map::MapError),

    #[error(transparent)]
    Io(#[from] trellis_io::IoError),
}

pub type SdkResult<T> = Result<T, SdkError>;
