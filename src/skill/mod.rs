//! Skill definitions: the declarative, ordered description of a workflow.
//!
//! A skill file is YAML with a required `name`, optional `inputs` and
//! `outputs`, and an ordered list of `steps`. Each step references exactly
//! one action: a named external tool or an inline computation.
//!
//! Parsing is tolerant. A malformed step block is skipped and reported as a
//! [`ParseDiagnostic`]; the rest of the skill still loads. Only a document
//! with no resolvable name is rejected.
//!
//! ```ignore
//! use skillview::skill::SkillParser;
//!
//! let parsed = SkillParser::parse_str(yaml)?;
//! for step in &parsed.definition.steps {
//!     println!("{} -> {:?}", step.name(), step.tags());
//! }
//! ```

mod catalog;
mod parser;
mod types;

pub use catalog::*;
pub use parser::*;
pub use types::*;
