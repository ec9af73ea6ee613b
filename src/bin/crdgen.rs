//! # CRD Generator
//!
//! Generates the CustomResourceDefinition YAML for every kind the controller
//! manages from the Rust type definitions, as one multi-document stream.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/all.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The generated CRDs include:
//! - OpenAPI schema validation
//! - Default values
//! - Status subresource
//! - Ready/Synced print columns

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::CustomResourceExt;
use media_config_controller::crd::{
    LidarrConfig, ProwlarrConfig, RadarrConfig, ReadarrConfig, SonarrConfig,
};

fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        SonarrConfig::crd(),
        RadarrConfig::crd(),
        LidarrConfig::crd(),
        ReadarrConfig::crd(),
        ProwlarrConfig::crd(),
    ]
}

fn main() {
    let mut documents = Vec::new();
    for crd in all_crds() {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => documents.push(yaml),
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {}", e);
                std::process::exit(1);
            }
        }
    }
    print!("{}", documents.join("---\n"));
}
