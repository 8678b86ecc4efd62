use std::marker::PhantomData;

use anyhow::Context;
use axum::{
  RequestPartsExt,
  extract::{FromRef, FromRequestParts},
  http::request::Parts,
};
use axum_extra::{
  TypedHeader,
  headers::{Authorization, authorization::Bearer},
};
use libtally::prelude::*;

use crate::api::{AppState, errors::AppError};

/// Requires a bearer token matching the configured API key, when one is set.
#[non_exhaustive]
pub(crate) struct Auth<S> {
  _marker: PhantomData<S>,
}

impl<St, S> FromRequestParts<St> for Auth<S>
where
  S: DocumentStore,
  St: Send + Sync,
  AppState<S>: FromRef<St>,
{
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let app_state = AppState::<S>::from_ref(state);

    let Some(api_key) = app_state.config.api_key else {
      return Ok(Auth { _marker: PhantomData });
    };

    let header = parts
      .extract::<TypedHeader<Authorization<Bearer>>>()
      .await
      .context("no authorization header found")
      .context(AppError::InvalidCredentials)?;

    if header.token() != api_key {
      return Err(AppError::InvalidCredentials);
    }

    Ok(Auth { _marker: PhantomData })
  }
}
