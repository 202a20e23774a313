//! Rule model and inference.
//!
//! ## How the parts work together
//!
//! ```text
//! Vec<Rule> + substitution variables
//!        │  Model::rebuild                  (model.rs)
//!        │    - apply variables to each rule
//!        │    - RuleIndex::build            (index.rs)
//!        v
//!   Arc<RuleIndex>   key -> [Rule] by descending priority
//!        │
//!        │  Context::infer(key)             (context.rs)
//!        │    - cycle / depth guard
//!        │    - Model::fire_first
//!        v
//!   first rule whose specifier holds -> its value, evaluated
//! ```
//!
//! Rules are evaluated with the context itself as `SELF`. Reading a key the
//! context has no value for infers it, so inference chains through rules.
//!
//! ## Responsibilities by module
//!
//! - `rule.rs`: `Rule` and its priority (structural specificity plus weight).
//! - `index.rs`: the per-key, priority-ordered buckets.
//! - `model.rs`: owns rules and variables; rebuilds and swaps the index.
//! - `context.rs`: key lookup, nesting, and the inference guard.
//!
//! ## Debugging
//!
//! Index rebuilds and rule firings are logged at `debug` level through the
//! `log` facade; inference steps at `trace`.

#[path = "engine/context.rs"]
mod context;
#[path = "engine/index.rs"]
mod index;
#[path = "engine/model.rs"]
mod model;
#[path = "engine/rule.rs"]
mod rule;

pub use context::Context;
pub use index::RuleIndex;
pub use model::Model;
pub use rule::{Rule, WEIGHT_SCALE, specificity};
