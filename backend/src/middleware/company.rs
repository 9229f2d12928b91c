//! Acting-company extractor
//!
//! Authentication lives in front of this service. Requests arrive with the
//! company they act for in the `X-Company-Id` header, and every workflow
//! operation receives it explicitly.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shared::{ActingCompany, CompanyId};

use crate::error::AppError;

pub const COMPANY_HEADER: &str = "x-company-id";

/// Extractor for the company a request acts on behalf of
#[derive(Debug, Clone, Copy)]
pub struct CurrentCompany(pub ActingCompany);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentCompany
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(COMPANY_HEADER)
            .ok_or_else(|| AppError::validation("X-Company-Id", "Acting company header is required"))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<CompanyId>().ok())
            .map(|company_id| CurrentCompany(ActingCompany::new(company_id)))
            .ok_or_else(|| AppError::validation("X-Company-Id", "Acting company must be a numeric id"))
    }
}
