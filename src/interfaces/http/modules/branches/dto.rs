//! Branch DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{Branch, BranchChanges, NewBranch};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BranchDto {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Branch> for BranchDto {
    fn from(b: Branch) -> Self {
        Self {
            id: b.id,
            name: b.name,
            address: b.address,
            phone: b.phone,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

impl From<CreateBranchRequest> for NewBranch {
    fn from(r: CreateBranchRequest) -> Self {
        Self {
            name: r.name,
            address: r.address,
            phone: r.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBranchRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

impl From<UpdateBranchRequest> for BranchChanges {
    fn from(r: UpdateBranchRequest) -> Self {
        Self {
            name: r.name,
            address: r.address,
            phone: r.phone,
        }
    }
}
