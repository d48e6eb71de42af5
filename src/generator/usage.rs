//! Usage reporting policy.

use crate::generator::routes::MethodPatterns;
use crate::generator::GenerationError;
use crate::resources::{
    HttpUri, OperationRequirement, ServiceControlFilterConfig, ServiceControlRule,
    ServiceControlService,
};
use crate::servicespec::ServiceSpecification;

/// Build the service_control config when the specification enables reporting.
///
/// `token_uri` is the proxy's own credential endpoint for outbound report
/// calls; reporting cannot be configured without it.
pub fn build_service_control(
    spec: &ServiceSpecification,
    methods: &[MethodPatterns],
    service_control_uri: &HttpUri,
    token_uri: Option<&HttpUri>,
) -> Result<Option<ServiceControlFilterConfig>, GenerationError> {
    if !spec.usage_reporting_enabled() {
        return Ok(None);
    }
    if spec.name.is_empty() {
        return Err(GenerationError::MissingField { field: "name" });
    }
    let token_uri = token_uri.ok_or(GenerationError::MissingTokenUri)?;

    let rules = methods
        .iter()
        .map(|m| ServiceControlRule {
            patterns: m.patterns.clone(),
            requires: OperationRequirement {
                operation_name: m.selector(),
                service_name: spec.name.clone(),
            },
        })
        .collect();

    Ok(Some(ServiceControlFilterConfig {
        rules,
        service_control_uri: service_control_uri.clone(),
        service_name: spec.name.clone(),
        services: vec![ServiceControlService {
            service_control_uri: service_control_uri.clone(),
            service_name: spec.name.clone(),
            token_uri: token_uri.clone(),
        }],
    }))
}
