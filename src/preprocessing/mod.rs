//! Feature preprocessing stages, applied in a fixed order:
//! derive, encode, scale, select.

pub mod deriver;
pub mod encoder;
pub mod scaler;
pub mod selector;
pub mod split;

pub use deriver::{
    DerivedTransaction, FeatureDeriver, LABEL_COLUMN, MODEL_INPUT_COLUMNS, NON_FEATURE_COLUMNS,
};
pub use encoder::{CategoryMapping, EncodingState};
pub use scaler::{ColumnRange, ScalingState, NUMERIC_COLUMNS};
pub use selector::{FeatureSchema, FINAL_FEATURES, SCHEMA_VERSION};
pub use split::{split_dataset, SplitConfig, SplitDataset};
