pub mod construction;
pub mod labeled;
pub mod model;
pub mod serialization;
pub mod vocabulary;

pub use construction::GraphLoader;
pub use labeled::{LabeledGraph, LabeledGraphBuilder};
pub use model::{Attributes, GraphId, RawDataset, RawEdge, RawGraph, RawNode};
pub use serialization::GraphWriter;
pub use vocabulary::{LabelId, LabelPolicy, LabelVocabulary};
