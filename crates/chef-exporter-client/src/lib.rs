//! chef-exporter-client: Chef server API client
//!
//! Signs requests with the Chef authentication protocol (version 1.3) and
//! exposes the partial search endpoint used by the exporter.
//!
//! # Example
//!
//! ```no_run
//! use chef_exporter_client::{ChefClient, ClientKey, Projection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = ClientKey::from_file("/etc/chef/client.pem")?;
//! let client = ChefClient::new("https://chef.example.com/organizations/acme", "exporter", Some(key))?;
//!
//! let projection = Projection::new()
//!     .attribute("name", &["name"])
//!     .attribute("ohai_time", &["ohai_time"]);
//! let result = client.partial_search("node", "*:*", &projection).await?;
//! println!("{} rows", result.rows.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod http;
pub mod types;

pub use auth::{ClientKey, KeyError, SignedHeaders};
pub use error::{ChefError, Result};
pub use http::ChefClient;
pub use types::{PartialSearchResponse, Projection};
