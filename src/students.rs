use std::str::FromStr;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::err::{creates, proceeds, Data, Error, Message, Payload};
use crate::models::{Student, VerifyStatus, REGISTRATION_ONLINE, STATUS_PENDING};
use crate::store::StudentStore;
use crate::validate::{
    coerce_classes, coerce_fee, coerce_string, validate_student, NewStudent, RegistrationPath,
};

pub async fn list<S: StudentStore>(store: &S, filter: &ListFilter) -> Result<Vec<Student>, Error> {
    let students = store.all_students().await?;
    Ok(students
        .into_iter()
        .filter(|student| filter.matches(student))
        .collect())
}

pub async fn get<S: StudentStore>(store: &S, id: Uuid) -> Result<Student, Error> {
    store.find_student(id).await?.ok_or_else(student_not_found)
}

pub async fn create<S: StudentStore>(store: &S, data: &Value) -> Result<Student, Error> {
    let now = Utc::now();
    let new = validate_student(data, RegistrationPath::WalkIn, now)?;
    ensure_email_free(store, &new.email).await?;
    let student = assemble(new, now);
    store.insert_student(&student).await?;
    Ok(student)
}

/// Public self-registration: the record goes in as a pending online
/// registration, and the response envelope never echoes the receipt.
pub async fn register_public<S: StudentStore>(store: &S, data: &Value) -> Result<Student, Error> {
    let now = Utc::now();
    let new = validate_student(data, RegistrationPath::Online, now)?;
    ensure_email_free(store, &new.email).await?;
    let mut student = assemble(new, now);
    student.registration_type = Some(REGISTRATION_ONLINE.to_string());
    student.status = Some(STATUS_PENDING.to_string());
    store.insert_student(&student).await?;
    Ok(student)
}

pub async fn update<S: StudentStore>(store: &S, id: Uuid, data: &Value) -> Result<Student, Error> {
    let mut student = store.find_student(id).await?.ok_or_else(student_not_found)?;
    if let Some(email) = data.get("email").and_then(Value::as_str) {
        let email = email.trim().to_lowercase();
        if email != student.email {
            ensure_email_free(store, &email).await?;
        }
    }
    apply_update(&mut student, data)?;
    student.updated_at = Utc::now();
    if !store.replace_student(&student).await? {
        return Err(student_not_found());
    }
    Ok(student)
}

pub async fn verify<S: StudentStore>(
    store: &S,
    id: Uuid,
    status: VerifyStatus,
) -> Result<(), Error> {
    if !store
        .set_student_status(id, status.as_str(), Utc::now())
        .await?
    {
        return Err(student_not_found());
    }
    Ok(())
}

pub async fn delete<S: StudentStore>(store: &S, id: Uuid) -> Result<(), Error> {
    if !store.delete_student(id).await? {
        return Err(student_not_found());
    }
    Ok(())
}

async fn ensure_email_free<S: StudentStore>(store: &S, email: &str) -> Result<(), Error> {
    if store.find_student_by_email(email).await?.is_some() {
        return Err(Error::conflict("Email already registered"));
    }
    Ok(())
}

fn assemble(new: NewStudent, now: DateTime<Utc>) -> Student {
    Student {
        id: Uuid::new_v4(),
        first_name: new.first_name,
        last_name: new.last_name,
        email: new.email,
        mobile: new.mobile,
        gender: new.gender,
        address: new.address,
        classes: new.classes,
        register_date: new.register_date,
        registration_fee: new.registration_fee,
        registration_type: None,
        status: None,
        payment_receipt: new.payment_receipt,
        payment_receipt_name: new.payment_receipt_name,
        created_at: now,
        updated_at: now,
    }
}

/// Only this fixed set of fields may be mutated; anything else in the
/// payload is silently ignored.
fn apply_update(student: &mut Student, data: &Value) -> Result<(), Error> {
    if let Some(value) = data.get("firstName") {
        student.first_name = coerce_string("firstName", value)?;
    }
    if let Some(value) = data.get("lastName") {
        student.last_name = coerce_string("lastName", value)?;
    }
    if let Some(value) = data.get("email") {
        student.email = coerce_string("email", value)?.to_lowercase();
    }
    if let Some(value) = data.get("mobile") {
        student.mobile = coerce_string("mobile", value)?;
    }
    if let Some(value) = data.get("gender") {
        student.gender = coerce_string("gender", value)?;
    }
    if let Some(value) = data.get("address") {
        student.address = coerce_string("address", value)?;
    }
    if let Some(value) = data.get("classes") {
        student.classes = coerce_classes(value)?;
    }
    if let Some(value) = data.get("registerDate") {
        student.register_date = coerce_string("registerDate", value)?;
    }
    if let Some(value) = data.get("registrationFee") {
        student.registration_fee = coerce_fee(value)?;
    }
    Ok(())
}

fn student_not_found() -> Error {
    Error::not_found("Student not found")
}

/// Optional list filters; active ones are ANDed together. The search term
/// runs its own OR across name, email, and mobile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    pub gender: Option<String>,
    pub class: Option<String>,
    pub month: Option<String>,
    pub search: Option<String>,
}

impl ListFilter {
    fn active(raw: &Option<String>) -> Option<&str> {
        raw.as_deref().filter(|value| !value.is_empty())
    }

    pub fn matches(&self, student: &Student) -> bool {
        if let Some(gender) = Self::active(&self.gender) {
            if student.gender != gender {
                return false;
            }
        }
        if let Some(class) = Self::active(&self.class) {
            if !student.classes.iter().any(|tag| tag == class) {
                return false;
            }
        }
        if let Some(month) = Self::active(&self.month) {
            if !student.register_date.starts_with(month) {
                return false;
            }
        }
        if let Some(search) = Self::active(&self.search) {
            let needle = search.to_lowercase();
            let hit = [
                &student.first_name,
                &student.last_name,
                &student.email,
                &student.mobile,
            ]
            .iter()
            .any(|haystack| haystack.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

pub async fn list_students(
    Query(filter): Query<ListFilter>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentList> {
    let students = list(&pg, &filter).await?;
    let count = students.len();
    proceeds(StudentList {
        data: students,
        count,
    })
}

pub async fn get_student(
    Path(id): Path<String>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Data<Student>> {
    let id = Uuid::from_str(&id)?;
    let student = get(&pg, id).await?;
    proceeds(Data { data: student })
}

pub async fn create_student(
    Json(body): Json<Value>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentSaved> {
    let student = create(&pg, &body).await?;
    creates(StudentSaved {
        message: "Student registered successfully",
        data: student,
    })
}

pub async fn register_student(
    Json(body): Json<Value>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentSaved> {
    let student = register_public(&pg, &body).await?;
    creates(StudentSaved {
        message: "Registration submitted successfully! We will verify your payment and confirm enrollment.",
        data: student,
    })
}

pub async fn update_student(
    Path(id): Path<String>,
    Json(body): Json<Value>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentSaved> {
    let id = Uuid::from_str(&id)?;
    let student = update(&pg, id, &body).await?;
    proceeds(StudentSaved {
        message: "Student updated successfully",
        data: student,
    })
}

pub async fn verify_student(
    Path(id): Path<String>,
    Json(body): Json<VerifyRequest>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Message> {
    let status = body
        .status
        .as_deref()
        .and_then(VerifyStatus::parse)
        .ok_or_else(|| Error::validation("Invalid status"))?;
    let id = Uuid::from_str(&id)?;
    verify(&pg, id, status).await?;
    proceeds(Message {
        message: format!("Student {} successfully", status.as_str()),
    })
}

pub async fn delete_student(
    Path(id): Path<String>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Message> {
    let id = Uuid::from_str(&id)?;
    delete(&pg, id).await?;
    proceeds(Message {
        message: "Student deleted successfully".to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentList {
    pub data: Vec<Student>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSaved {
    pub message: &'static str,
    pub data: Student,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub status: Option<String>,
}
