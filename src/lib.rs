//! This library provides the presentation side of the [Decentralized Claims
//! Protocol]: a participant of a dataspace answers presentation queries of
//! other participants with the credentials they were granted access to.
//!
//! [Decentralized Claims Protocol]: <https://eclipse-dataspace-dcp.github.io/decentralized-claims-protocol/>
//!
//! # Usage
//!
//! The [`PresentationQueryHandler`] ties the pipeline together. It is built
//! from the participant's collaborators: where participants are looked up,
//! where public keys of requesters and of the token-issuing authority are
//! resolved, where credentials are stored and how presentations are signed.
//!
//! ```ignore
//! use dcp_presentation::config::PipelineConfig;
//! use dcp_presentation::pipeline::PresentationQueryHandler;
//!
//! let handler = PresentationQueryHandler::builder()
//!     .with_config(PipelineConfig::default())
//!     .with_participants(participants)
//!     .with_participant_keys(did_key_resolver)
//!     .with_authority_keys(sts_key_resolver)
//!     .with_store(credential_store)
//!     .with_signing_service(signing_service)
//!     .build()?;
//!
//! // `query` is the JSON body of the request, `authorization` its
//! // `Authorization` header.
//! let response = handler
//!     .query_presentation("participant-1", &query, authorization)
//!     .await?;
//! ```
//!
//! Each collaborator is a trait and can be replaced independently. The
//! in-memory implementations ([`MemoryParticipantStore`],
//! [`StaticKeyResolver`], [`MemoryCredentialStore`] and
//! [`LocalSigningService`]) are meant for tests.
//!
//! [`PresentationQueryHandler`]: crate::pipeline::PresentationQueryHandler
//! [`MemoryParticipantStore`]: crate::verifier::participant::MemoryParticipantStore
//! [`StaticKeyResolver`]: crate::verifier::keys::StaticKeyResolver
//! [`MemoryCredentialStore`]: crate::resolver::store::MemoryCredentialStore
//! [`LocalSigningService`]: crate::holder::signer::LocalSigningService
//!
//! # Protocol Overview
//!
//! Here is a simplified overview of a presentation query, referencing the
//! various types and methods implementing it.
//!
//! ## Authentication
//!
//! 1. *Requester presents a token*: The requester sends a self-issued ID
//!    token, signed with a key of its own key space. The ID token embeds an
//!    access token, issued by a token-issuing authority, whose `scope` claim
//!    lists the scopes the requester was granted.
//! 2. *Token verification*: The [`SelfIssuedTokenVerifier`] verifies both
//!    tokens, each against its own trust anchor, and correlates their
//!    subjects. Claims are checked with composable [`ValidationRule`]s.
//!
//! [`SelfIssuedTokenVerifier`]: crate::verifier::SelfIssuedTokenVerifier
//! [`ValidationRule`]: crate::core::validation::ValidationRule
//!
//! ## Authorization
//!
//! 3. *Scope check*: Every scope in the [`PresentationQuery`] must have been
//!    granted.
//! 4. *Credential query*: Scopes are turned into storage criteria by a
//!    [`ScopeToCriterionTransformer`], and the [`CredentialQueryResolver`]
//!    queries the credential store for the participant's active credentials.
//!
//! [`PresentationQuery`]: crate::core::query::PresentationQuery
//! [`ScopeToCriterionTransformer`]: crate::core::scope::ScopeToCriterionTransformer
//! [`CredentialQueryResolver`]: crate::resolver::CredentialQueryResolver
//!
//! ## Presentation
//!
//! 5. *Packaging*: The credentials are packaged into a Verifiable
//!    Presentation by the [`PresentationGenerator`] of the configured format,
//!    and signed with the participant's key.
//!
//! [`PresentationGenerator`]: crate::holder::PresentationGenerator
//!
//! # Presentation Formats
//!
//! - **JWT VP** (`jwt_vp`): VC Data Model 1.1 presentation of JWT credentials
//! - **Enveloped JOSE VP** (`enveloped_jose_vp`): VC Data Model 2.0 enveloped
//!   presentation of `vc+jwt` credentials
//!
//! Presentation definitions (DIF Presentation Exchange) are recognized but
//! rejected as unsupported.
//!
//! # Errors
//!
//! Every stage has its own error type. At the boundary they are all mapped
//! into a [`ServiceError`], whose [`ErrorCategory`] maps onto a transport
//! status.
//!
//! [`ServiceError`]: crate::error::ServiceError
//! [`ErrorCategory`]: crate::error::ErrorCategory

pub mod config;
pub mod core;
pub mod error;
pub mod holder;
pub mod pipeline;
pub mod resolver;
pub mod utils;
pub mod verifier;
