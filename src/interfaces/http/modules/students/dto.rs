//! Student DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::domain::{NewStudent, Student, StudentChanges};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentDto {
    pub id: i32,
    pub branch_id: i32,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub seat_number: Option<String>,
    pub membership_start: NaiveDate,
    pub membership_end: NaiveDate,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Student> for StudentDto {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            branch_id: s.branch_id,
            full_name: s.full_name,
            email: s.email,
            phone: s.phone,
            seat_number: s.seat_number,
            membership_start: s.membership_start,
            membership_end: s.membership_end,
            reminder_sent_at: s.reminder_sent_at,
            photo_url: s.photo_url,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

fn validate_period(r: &CreateStudentRequest) -> Result<(), ValidationError> {
    if r.membership_end < r.membership_start {
        let mut err = ValidationError::new("membership_period");
        err.message = Some("membership_end must not be before membership_start".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_period"))]
pub struct CreateStudentRequest {
    #[validate(range(min = 1, message = "branch_id is required"))]
    pub branch_id: i32,
    #[validate(length(min = 1, max = 255, message = "full_name must be 1-255 characters"))]
    pub full_name: String,
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 20))]
    pub seat_number: Option<String>,
    pub membership_start: NaiveDate,
    pub membership_end: NaiveDate,
}

impl From<CreateStudentRequest> for NewStudent {
    fn from(r: CreateStudentRequest) -> Self {
        Self {
            branch_id: r.branch_id,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone,
            seat_number: r.seat_number,
            membership_start: r.membership_start,
            membership_end: r.membership_end,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStudentRequest {
    #[validate(range(min = 1))]
    pub branch_id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "full_name must be 1-255 characters"))]
    pub full_name: Option<String>,
    #[validate(email(message = "invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 20))]
    pub seat_number: Option<String>,
    pub membership_start: Option<NaiveDate>,
    /// Moving the end date re-arms the expiry reminder
    pub membership_end: Option<NaiveDate>,
}

impl From<UpdateStudentRequest> for StudentChanges {
    fn from(r: UpdateStudentRequest) -> Self {
        Self {
            branch_id: r.branch_id,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone,
            seat_number: r.seat_number,
            membership_start: r.membership_start,
            membership_end: r.membership_end,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListStudentsParams {
    pub branch_id: Option<i32>,
    /// Matches name, e-mail or seat number
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpiringParams {
    /// Window length in days, defaults to the reminder window
    pub days: Option<i64>,
    pub branch_id: Option<i32>,
}

/// Membership ending soon
#[derive(Debug, Serialize, ToSchema)]
pub struct ExpiringStudentDto {
    #[serde(flatten)]
    pub student: StudentDto,
    pub days_remaining: i64,
}
