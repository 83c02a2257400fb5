mod backend;
pub mod backends;
mod result;
mod waste;

pub use backend::Classifier;
pub use backends::{classifier_for_endpoint, HttpClassifier, StubClassifier};
pub use result::{BoundingBox, Classification, ClassificationResult, Detection, TopPrediction};
pub use waste::{waste_type_for, WasteType, WasteTypeTable};
