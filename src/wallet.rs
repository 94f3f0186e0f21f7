use async_trait::async_trait;
use serde_json::{Map, Value as Json};

use crate::{
    config::WalletConfiguration,
    core::{
        authorization_request::{
            resolved::ResolvedRequestData,
            resolver::{PredefinedDefinitions, ResolutionError, Resolver},
            verification::RequestVerifier,
            AuthorizationRequest,
        },
        matcher::{MatchError, PresentationMatcher},
        presentation_definition::PresentationDefinition,
        presentation_submission::PresentationSubmission,
        response::{
            builder::{BuildError, ResponseBuilder},
            dispatcher::{DispatchOutcome, Dispatcher},
            parameters::IdToken,
            AuthorizationResponse, ClientConsent,
        },
        util::Transport,
    },
};

/// A holder's wallet.
///
/// Implementors supply configuration and a [Transport]; the protocol steps
/// come with default implementations:
///
/// 1. [resolve_request](Wallet::resolve_request) the incoming request,
/// 2. [match_presentation](Wallet::match_presentation) the holder's claims,
///    and after the holder consented,
/// 3. [build_response](Wallet::build_response) and
///    [dispatch](Wallet::dispatch) it.
#[async_trait]
pub trait Wallet: Sync {
    fn configuration(&self) -> &WalletConfiguration;
    fn transport(&self) -> &dyn Transport;

    /// Definitions a `scope` value can stand for.
    fn predefined_definitions(&self) -> &PredefinedDefinitions;

    /// Keys request objects are verified with. Defaults to the configured
    /// pre-registered clients, plus `did:key` clients.
    fn request_verifier(&self) -> &dyn RequestVerifier {
        &self.configuration().preregistered_clients
    }

    async fn resolve_request(
        &self,
        request: AuthorizationRequest,
    ) -> Result<ResolvedRequestData, ResolutionError> {
        Resolver::new(
            self.transport(),
            self.predefined_definitions(),
            self.request_verifier(),
        )
            .with_supported_client_id_schemes(&self.configuration().supported_client_id_schemes)
            .resolve(request)
            .await
    }

    fn match_presentation(
        &self,
        definition: &PresentationDefinition,
        claims: &Json,
    ) -> Result<PresentationSubmission, MatchError> {
        PresentationMatcher::default().match_claims(definition, claims)
    }

    /// A self-issued id token, for [ClientConsent::IdToken] and
    /// [ClientConsent::IdAndVpToken].
    fn issue_id_token(
        &self,
        request: &ResolvedRequestData,
        holder_claims: Map<String, Json>,
    ) -> Result<IdToken, BuildError> {
        ResponseBuilder::new(self.configuration()).id_token(request, holder_claims)
    }

    fn build_response(
        &self,
        request: &ResolvedRequestData,
        consent: ClientConsent,
    ) -> Result<AuthorizationResponse, BuildError> {
        ResponseBuilder::new(self.configuration()).build(request, consent)
    }

    async fn dispatch(&self, response: AuthorizationResponse) -> DispatchOutcome {
        Dispatcher::new(self.transport()).dispatch(response).await
    }
}
