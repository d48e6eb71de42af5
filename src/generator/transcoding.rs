//! gRPC/JSON transcoding policy.

use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::generator::GenerationError;
use crate::resources::TranscoderConfig;
use crate::servicespec::ServiceSpecification;

/// Standard alphabet, padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Transcoder config for the specification's descriptor, if one is attached.
///
/// The descriptor is decoded and re-encoded so the proxy always receives
/// canonical padded base64, whatever alphabet, padding or line breaks the
/// source used.
pub fn build_transcoder(spec: &ServiceSpecification) -> Result<Option<TranscoderConfig>, GenerationError> {
    let Some(file) = spec.descriptor_file() else {
        return Ok(None);
    };
    if spec.apis.is_empty() {
        return Ok(None);
    }

    let compact: String = file
        .file_contents
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = LENIENT
        .decode(compact.replace('-', "+").replace('_', "/"))
        .map_err(|e| GenerationError::InvalidDescriptor {
            file_path: file.file_path.clone(),
            reason: e.to_string(),
        })?;

    Ok(Some(TranscoderConfig {
        proto_descriptor_bin: STANDARD.encode(bytes),
        services: spec.apis.iter().map(|api| api.name.clone()).collect(),
    }))
}
