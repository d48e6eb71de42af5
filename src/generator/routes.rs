//! Route table derivation.
//!
//! # Responsibilities
//! - Derive every (verb, template) pattern a method is reachable under
//! - Emit one prefix route per API towards that API's cluster
//! - Report HTTP rules that bind nothing
//!
//! # Design Decisions
//! - The implicit gRPC pattern always comes first, explicit bindings follow
//!   in specification order
//! - An unmatched HTTP rule is a hygiene warning, not a failure

use std::collections::HashSet;
use std::fmt;

use crate::resources::{Route, RouteAction, RouteMatch, RoutePattern};
use crate::servicespec::{Api, HttpRule, ServiceSpecification};

/// Verb of the implicit gRPC-framed pattern.
pub const GRPC_METHOD: &str = "POST";

/// Non-fatal problems found while building routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An HTTP rule names a selector no API declares.
    UnmatchedHttpRule { selector: String },
    /// An HTTP rule carries no verb/path binding.
    EmptyHttpRule { selector: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnmatchedHttpRule { selector } => {
                write!(f, "http rule selector {} matches no known method", selector)
            }
            Warning::EmptyHttpRule { selector } => {
                write!(f, "http rule for {} has no verb and path", selector)
            }
        }
    }
}

/// The patterns one method is reachable under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPatterns {
    pub api: String,
    pub method: String,
    pub patterns: Vec<RoutePattern>,
}

impl MethodPatterns {
    /// `<api>.<method>`; also the operation name reported for usage.
    pub fn selector(&self) -> String {
        format!("{}.{}", self.api, self.method)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    /// One entry per method, in declaration order across APIs.
    pub methods: Vec<MethodPatterns>,
    /// One prefix route per API.
    pub routes: Vec<Route>,
    pub warnings: Vec<Warning>,
}

/// `/<api>/<method>`: the path a gRPC client posts to.
pub fn grpc_path(api: &str, method: &str) -> String {
    format!("/{}/{}", api, method)
}

/// Cluster name serving an API.
pub fn cluster_name(api: &Api) -> String {
    api.name.clone()
}

/// Build the route table of a whole specification.
pub fn build_route_table(spec: &ServiceSpecification) -> RouteTable {
    let mut table = RouteTable::default();

    for api in &spec.apis {
        for method in &api.methods {
            let selector = api.selector(&method.name);
            let mut patterns = vec![RoutePattern::new(GRPC_METHOD, grpc_path(&api.name, &method.name))];

            for rule in spec.http.rules.iter().filter(|r| r.selector == selector) {
                patterns.extend(explicit_patterns(rule));
            }

            table.methods.push(MethodPatterns {
                api: api.name.clone(),
                method: method.name.clone(),
                patterns,
            });
        }

        table.routes.push(Route {
            route_match: RouteMatch {
                prefix: format!("/{}", api.name),
            },
            route: RouteAction {
                cluster: cluster_name(api),
            },
        });
    }

    table.warnings = hygiene_warnings(spec);
    table
}

/// The rule's own binding followed by its additional bindings.
fn explicit_patterns(rule: &HttpRule) -> Vec<RoutePattern> {
    std::iter::once(rule)
        .chain(rule.additional_bindings.iter())
        .filter_map(HttpRule::binding)
        .map(|(verb, path)| RoutePattern::new(verb, path))
        .collect()
}

fn hygiene_warnings(spec: &ServiceSpecification) -> Vec<Warning> {
    let known: HashSet<String> = spec.method_selectors().collect();

    spec.http
        .rules
        .iter()
        .filter_map(|rule| {
            if !known.contains(&rule.selector) {
                Some(Warning::UnmatchedHttpRule {
                    selector: rule.selector.clone(),
                })
            } else if rule.binding().is_none() {
                Some(Warning::EmptyHttpRule {
                    selector: rule.selector.clone(),
                })
            } else {
                None
            }
        })
        .collect()
}
