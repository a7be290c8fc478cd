mod cache;
mod dump;
mod record;
mod schema;

pub use cache::{RecordCache, RecordLookup, RecordSource};
pub use dump::{KnowledgeBase, load_knowledgebase, parse_knowledgebase};
pub use record::{
    CLASS_FIELD, ID_FIELD, Record, lookup_path, record_class, record_id, reference_id,
    scalar_text,
};
pub use schema::{ClassInfo, KbSchema, Schema};
