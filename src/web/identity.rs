use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use crate::errors::MarketError;
use crate::models::{Actor, Role};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Caller identity asserted by the upstream auth proxy
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Actor);

impl Identity {
    pub fn actor(&self) -> &Actor {
        &self.0
    }

    pub fn user_id(&self) -> Uuid {
        self.0.user_id
    }
}

impl FromRequest for Identity {
    type Error = MarketError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(identify(req))
    }
}

fn identify(req: &HttpRequest) -> Result<Identity, MarketError> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let Some(raw_id) = header(USER_ID_HEADER) else {
        return Err(MarketError::Unauthenticated);
    };
    let user_id = Uuid::parse_str(raw_id).map_err(|_| {
        tracing::warn!(header = USER_ID_HEADER, "Rejected malformed user id");
        MarketError::Unauthenticated
    })?;

    let role = match header(USER_ROLE_HEADER) {
        Some(raw) => raw.parse::<Role>().map_err(MarketError::ValidationError)?,
        None => Role::Customer,
    };

    Ok(Identity(Actor { user_id, role }))
}
