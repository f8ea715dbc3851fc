//! Variable resolution module
//!
//! Provides parsing and resolution of `{{variable}}` syntax in strings.
//!
//! # Usage
//!
//! ```
//! use strata_application::variable_resolver::VariableResolver;
//! use strata_domain::environment::{NoCachedValues, ResolvedView, Variable};
//!
//! let env = vec![Variable::new("host", "localhost")];
//! let view = ResolvedView::build(&[], &[], &env, &NoCachedValues);
//! let resolver = VariableResolver::new(view);
//!
//! let result = resolver.resolve("http://{{host}}/api");
//! assert_eq!(result.resolved, "http://localhost/api");
//! ```

pub mod engine;
pub mod functions;
pub mod parser;

pub use engine::{ResolutionResult, VariableResolver};
pub use functions::{EvalContext, FunctionError, FunctionInfo, TemplateFunctions, error_marker};
pub use parser::{
    FunctionCall, VariableReference, extract_variable_names, has_variables,
    is_function_signature, is_valid_variable_name, parse_function_call, parse_variables,
};
