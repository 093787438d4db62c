//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! The generated tfplugin6 types live at the top of this module; the
//! go-plugin controller service lives in `plugin`.
//!
//! Some protobuf types share names with tfplug framework types
//! (`DynamicValue`, `Diagnostic`, `Schema`). Always use the `proto::` prefix
//! when referring to the protobuf ones.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

/// go-plugin's GRPCController, used by Terraform to shut the plugin down
pub mod plugin {
    include!(concat!(env!("OUT_DIR"), "/plugin.rs"));
}

pub use provider_server::{Provider as ProviderService, ProviderServer};
