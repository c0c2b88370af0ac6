//! Mockroute
//!
//! An HTTP mock server. Mock definitions are registered at startup or at
//! runtime through the `/configure-mock` API, and every other request is
//! answered by the best matching mock.
//!
//! # Features
//!
//! - **Route Matching**: Literal segments and `:name` captures, per method
//! - **Request Constraints**: Query parameters, body fields and headers
//! - **Conditional Responses**: First satisfied condition selects the response
//! - **Templates**: `{{path.to.value}}` placeholders resolved against the request
//! - **Header Gating**: Mocks that require headers reject mismatched credentials
//!
//! # Example Configuration
//!
//! ```yaml
//! listen: 0.0.0.0:4000
//! mocks:
//!   - route: /users/:id
//!     method: GET
//!     responseContent:
//!       id: "{{routeParams.id}}"
//!       name: "User {{routeParams.id}}"
//! ```

pub mod condition;
pub mod config;
pub mod context;
pub mod matcher;
pub mod mock;
pub mod registry;
pub mod server;
pub mod template;
pub mod validate;

pub use config::MockServerConfig;
pub use mock::{HttpMethod, Mock, MockData, MockUpdate};
pub use registry::Registry;
pub use server::{router, AppState};
