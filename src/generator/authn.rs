//! JWT authentication policy.
//!
//! # Requirement composition (per rule)
//! ```text
//! []            → no rule emitted, the method is open
//! [r]           → render(r)
//! [r1, r2, ...] → requires_any [render(r1), render(r2), ...]
//!
//! render(r):
//!     no audience override, or override == provider's declared set
//!         → provider_name
//!     otherwise
//!         → provider_and_audiences (override, in rule order)
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::generator::routes::grpc_path;
use crate::generator::GenerationError;
use crate::resources::{
    DataSource, JwtAuthnConfig, JwtProvider, JwtRequirement, JwtRule, ProviderWithAudiences,
    RequirementOrList, RouteMatch,
};
use crate::servicespec::{split_selector, AuthProvider, AuthRequirement, Authentication};

/// Provider id → JWKS document, resolved before generation.
pub type ResolvedKeys = BTreeMap<String, String>;

/// Build the jwt_authn filter config, or `None` when no provider is declared.
pub fn build_jwt_filter(
    auth: &Authentication,
    keys: &ResolvedKeys,
) -> Result<Option<JwtAuthnConfig>, GenerationError> {
    let mut declared: HashMap<&str, &AuthProvider> = HashMap::new();
    for provider in &auth.providers {
        if provider.id.is_empty() {
            return Err(GenerationError::MissingField {
                field: "authentication.providers[].id",
            });
        }
        if declared.insert(provider.id.as_str(), provider).is_some() {
            return Err(GenerationError::DuplicateProvider {
                provider_id: provider.id.clone(),
            });
        }
    }

    let mut rules = Vec::new();
    for rule in &auth.rules {
        if rule.requirements.is_empty() {
            continue;
        }

        let (service, method) = split_selector(&rule.selector).ok_or_else(|| {
            GenerationError::InvalidSelector {
                selector: rule.selector.clone(),
            }
        })?;

        let mut rendered = rule
            .requirements
            .iter()
            .map(|req| render_requirement(&rule.selector, req, &declared))
            .collect::<Result<Vec<_>, _>>()?;

        let requires = if rendered.len() == 1 {
            rendered.remove(0)
        } else {
            JwtRequirement::RequiresAny(RequirementOrList { requirements: rendered })
        };

        rules.push(JwtRule {
            route_match: RouteMatch {
                prefix: grpc_path(service, method),
            },
            requires,
        });
    }

    if auth.providers.is_empty() {
        return Ok(None);
    }

    let mut providers = BTreeMap::new();
    for provider in &auth.providers {
        let jwks = keys.get(&provider.id).ok_or_else(|| GenerationError::MissingKeys {
            provider_id: provider.id.clone(),
        })?;

        providers.insert(
            provider.id.clone(),
            JwtProvider {
                audiences: provider.audiences.clone(),
                issuer: provider.issuer.clone(),
                local_jwks: DataSource {
                    inline_string: jwks.clone(),
                },
            },
        );
    }

    Ok(Some(JwtAuthnConfig { providers, rules }))
}

fn render_requirement(
    selector: &str,
    req: &AuthRequirement,
    declared: &HashMap<&str, &AuthProvider>,
) -> Result<JwtRequirement, GenerationError> {
    let provider = declared
        .get(req.provider_id.as_str())
        .ok_or_else(|| GenerationError::UnknownProvider {
            selector: selector.to_string(),
            provider_id: req.provider_id.clone(),
        })?;

    if req.audiences.is_empty() {
        return Ok(JwtRequirement::ProviderName(provider.id.clone()));
    }

    let full: HashSet<&str> = provider.audiences.iter().map(String::as_str).collect();
    if let Some(missing) = req.audiences.iter().find(|a| !full.contains(a.as_str())) {
        return Err(GenerationError::AudienceNotDeclared {
            selector: selector.to_string(),
            provider_id: provider.id.clone(),
            audience: missing.clone(),
        });
    }

    let requested: HashSet<&str> = req.audiences.iter().map(String::as_str).collect();
    if requested == full {
        Ok(JwtRequirement::ProviderName(provider.id.clone()))
    } else {
        Ok(JwtRequirement::ProviderAndAudiences(ProviderWithAudiences {
            provider_name: provider.id.clone(),
            audiences: req.audiences.clone(),
        }))
    }
}
