//! This library provides the wallet side of [SIOPv2] and [OID4VP].
//!
//! [SIOPv2]: <https://openid.net/specs/openid-connect-self-issued-v2-1_0.html>
//! [OID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Wallet Usage
//!
//! Wallets are implemented with the [`Wallet`] trait:
//!
//! ```ignore
//! use siop_openid4vp::config::WalletConfiguration;
//! use siop_openid4vp::core::authorization_request::{
//!     resolver::PredefinedDefinitions, AuthorizationRequest,
//! };
//! use siop_openid4vp::core::response::{parameters::VpToken, ClientConsent};
//! use siop_openid4vp::core::util::{ReqwestTransport, Transport};
//! use siop_openid4vp::wallet::Wallet;
//!
//! struct MyWallet {
//!     config: WalletConfiguration,
//!     transport: ReqwestTransport,
//!     definitions: PredefinedDefinitions,
//! }
//!
//! impl Wallet for MyWallet {
//!     fn configuration(&self) -> &WalletConfiguration {
//!         &self.config
//!     }
//!
//!     fn transport(&self) -> &dyn Transport {
//!         &self.transport
//!     }
//!
//!     fn predefined_definitions(&self) -> &PredefinedDefinitions {
//!         &self.definitions
//!     }
//! }
//!
//! // Parse and resolve an authorization request.
//! let request = AuthorizationRequest::from_url(&request_url)?;
//! let resolved = wallet.resolve_request(request).await?;
//!
//! // Match the holder's claims against the requested definition.
//! let definition = resolved.presentation_definition().unwrap();
//! let presentation_submission = wallet.match_presentation(definition, &claims)?;
//!
//! // Once the holder consented, build and send the response.
//! let response = wallet.build_response(
//!     &resolved,
//!     ClientConsent::VpToken {
//!         vp_token: VpToken::Single(presentation),
//!         presentation_submission,
//!     },
//! )?;
//! let outcome = wallet.dispatch(response).await;
//! ```
//!
//! [`Wallet`]: crate::wallet::Wallet
//!
//! # Protocol Overview
//!
//! ## Authorization Request
//!
//! 1. *Parsing*: An [`AuthorizationRequest`] is read from a URL. It carries
//!    its parameters directly, or a request object by value or by reference.
//! 2. *Resolution*: The [`Resolver`] fetches what the request refers to,
//!    verifies the request object, validates the client metadata with the
//!    [`ClientMetaDataValidator`] and yields [`ResolvedRequestData`].
//!
//! [`AuthorizationRequest`]: crate::core::authorization_request::AuthorizationRequest
//! [`Resolver`]: crate::core::authorization_request::resolver::Resolver
//! [`ClientMetaDataValidator`]: crate::core::metadata::ClientMetaDataValidator
//! [`ResolvedRequestData`]: crate::core::authorization_request::resolved::ResolvedRequestData
//!
//! ## Presentation Matching
//!
//! 3. The [`PresentationMatcher`] evaluates a presentation definition against
//!    the holder's claims and produces a [`PresentationSubmission`].
//!
//! [`PresentationMatcher`]: crate::core::matcher::PresentationMatcher
//! [`PresentationSubmission`]: crate::core::presentation_submission::PresentationSubmission
//!
//! ## Authorization Response
//!
//! 4. *Building*: From the holder's [`ClientConsent`], the [`ResponseBuilder`]
//!    produces plain, signed or encrypted responses as the verifier's
//!    metadata asks for.
//! 5. *Dispatch*: The [`Dispatcher`] delivers the response according to its
//!    response mode.
//!
//! [`ClientConsent`]: crate::core::response::ClientConsent
//! [`ResponseBuilder`]: crate::core::response::builder::ResponseBuilder
//! [`Dispatcher`]: crate::core::response::dispatcher::Dispatcher
//!
//! All network access goes through the [`Transport`] trait.
//!
//! [`Transport`]: crate::core::util::Transport

pub mod config;
pub mod core;
pub mod utils;
pub mod wallet;
pub use serde_json_path::JsonPath;
