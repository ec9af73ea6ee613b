//! API key lookup for pull-model registration.
//!
//! Candidates are tried in order: the resource's own connection secret, then
//! `<service-type>-api-key`, then `<resource-name>-api-key`. A candidate that
//! is missing, lacks the key or holds an empty value falls through to the
//! next one. Store failures abort the lookup.

use crate::constants::DEFAULT_API_KEY_SECRET_KEY;
use crate::controller::registration::RegistrationError;
use crate::controller::secrets::{SecretError, SecretResolver, SecretStore};
use crate::crd::ManagedResource;
use kube::ResourceExt;
use tracing::debug;

fn candidates<K: ManagedResource>(resource: &K) -> Vec<(String, String)> {
    let own = &resource.connection().api_key_secret_ref;
    let mut candidates = vec![(
        own.name.clone(),
        own.key_or(DEFAULT_API_KEY_SECRET_KEY).to_string(),
    )];
    for name in [
        format!("{}-api-key", K::SERVICE_TYPE),
        format!("{}-api-key", resource.name_any()),
    ] {
        let candidate = (name, DEFAULT_API_KEY_SECRET_KEY.to_string());
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

pub async fn resolve_registration_api_key<K: ManagedResource>(
    resource: &K,
    store: &dyn SecretStore,
) -> Result<String, RegistrationError> {
    let namespace = resource.namespace().unwrap_or_default();
    let mut resolver = SecretResolver::new(store, &namespace);

    for (name, key) in candidates(resource) {
        match resolver.value(&name, &key).await {
            Ok(value) if !value.is_empty() => return Ok(value),
            Ok(_) => debug!(secret = %name, key = %key, "API key is empty, trying next candidate"),
            Err(SecretError::SecretNotFound { .. } | SecretError::KeyNotFound { .. }) => {
                debug!(secret = %name, key = %key, "API key candidate not available");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(RegistrationError::MissingApiKey(resource.name_any()))
}
