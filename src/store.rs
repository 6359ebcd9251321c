use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::err::Error;
use crate::models::{Admin, Student};

/// The slice of the document store the rest of the crate depends on.
/// Backed by PostgreSQL in production and by [`MemStore`] in tests.
#[allow(async_fn_in_trait)]
pub trait StudentStore {
    async fn insert_student(&self, student: &Student) -> Result<(), Error>;
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>, Error>;
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, Error>;
    /// All records, most recently created first.
    async fn all_students(&self) -> Result<Vec<Student>, Error>;
    async fn replace_student(&self, student: &Student) -> Result<bool, Error>;
    async fn set_student_status(
        &self,
        id: Uuid,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Error>;
    async fn delete_student(&self, id: Uuid) -> Result<bool, Error>;
    async fn find_admin(&self, username: &str) -> Result<Option<Admin>, Error>;
    async fn count_admins(&self) -> Result<i64, Error>;
    async fn insert_admin(&self, admin: &Admin) -> Result<(), Error>;
    async fn ping(&self) -> Result<(), Error>;
}

/// Creates both tables on first boot. The unique constraint on `email`
/// makes a concurrent duplicate insert fail at the store instead of
/// racing the repository's pre-check.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS students (
            id UUID PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            mobile TEXT NOT NULL,
            gender TEXT NOT NULL,
            address TEXT NOT NULL,
            classes TEXT[] NOT NULL,
            register_date TEXT NOT NULL,
            registration_fee BIGINT NOT NULL,
            registration_type TEXT,
            status TEXT,
            payment_receipt TEXT,
            payment_receipt_name TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS admins (
            username TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

impl StudentStore for PgPool {
    async fn insert_student(&self, student: &Student) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO students (id, first_name, last_name, email, mobile, gender, address, \
             classes, register_date, registration_fee, registration_type, status, \
             payment_receipt, payment_receipt_name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(student.id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.mobile)
        .bind(&student.gender)
        .bind(&student.address)
        .bind(&student.classes)
        .bind(&student.register_date)
        .bind(student.registration_fee)
        .bind(&student.registration_type)
        .bind(&student.status)
        .bind(&student.payment_receipt)
        .bind(&student.payment_receipt_name)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(self)
        .await?;
        Ok(())
    }

    async fn find_student(&self, id: Uuid) -> Result<Option<Student>, Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(self)
            .await
            .map_err(Error::from)
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = $1 LIMIT 1")
            .bind(email)
            .fetch_optional(self)
            .await
            .map_err(Error::from)
    }

    async fn all_students(&self) -> Result<Vec<Student>, Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY created_at DESC")
            .fetch_all(self)
            .await
            .map_err(Error::from)
    }

    async fn replace_student(&self, student: &Student) -> Result<bool, Error> {
        let res = sqlx::query(
            "UPDATE students SET first_name = $2, last_name = $3, email = $4, mobile = $5, \
             gender = $6, address = $7, classes = $8, register_date = $9, \
             registration_fee = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(student.id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.mobile)
        .bind(&student.gender)
        .bind(&student.address)
        .bind(&student.classes)
        .bind(&student.register_date)
        .bind(student.registration_fee)
        .bind(student.updated_at)
        .execute(self)
        .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn set_student_status(
        &self,
        id: Uuid,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let res = sqlx::query("UPDATE students SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(updated_at)
            .execute(self)
            .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, Error> {
        let res = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(self)
            .await?;
        Ok(res.rows_affected() >= 1)
    }

    async fn find_admin(&self, username: &str) -> Result<Option<Admin>, Error> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE username = $1 LIMIT 1")
            .bind(username)
            .fetch_optional(self)
            .await
            .map_err(Error::from)
    }

    async fn count_admins(&self) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins")
            .fetch_one(self)
            .await
            .map_err(Error::from)
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), Error> {
        sqlx::query("INSERT INTO admins VALUES ($1, $2, $3)")
            .bind(&admin.username)
            .bind(&admin.password_hash)
            .bind(admin.created_at)
            .execute(self)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(self).await?;
        Ok(())
    }
}

#[cfg(test)]
pub struct MemStore {
    students: std::sync::Mutex<Vec<Student>>,
    admins: std::sync::Mutex<Vec<Admin>>,
}

#[cfg(test)]
impl MemStore {
    pub fn new() -> Self {
        Self {
            students: std::sync::Mutex::new(Vec::new()),
            admins: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl StudentStore for MemStore {
    async fn insert_student(&self, student: &Student) -> Result<(), Error> {
        let mut students = self.students.lock().unwrap();
        // Mirrors the unique constraint on students.email.
        if students.iter().any(|s| s.email == student.email) {
            return Err(Error::conflict("Email already registered"));
        }
        students.push(student.clone());
        Ok(())
    }

    async fn find_student(&self, id: Uuid) -> Result<Option<Student>, Error> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, Error> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn all_students(&self) -> Result<Vec<Student>, Error> {
        let mut students = self.students.lock().unwrap().clone();
        students.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(students)
    }

    async fn replace_student(&self, student: &Student) -> Result<bool, Error> {
        let mut students = self.students.lock().unwrap();
        match students.iter_mut().find(|s| s.id == student.id) {
            Some(slot) => {
                *slot = student.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_student_status(
        &self,
        id: Uuid,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let mut students = self.students.lock().unwrap();
        match students.iter_mut().find(|s| s.id == id) {
            Some(student) => {
                student.status = Some(status.to_string());
                student.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, Error> {
        let mut students = self.students.lock().unwrap();
        let before = students.len();
        students.retain(|s| s.id != id);
        Ok(students.len() < before)
    }

    async fn find_admin(&self, username: &str) -> Result<Option<Admin>, Error> {
        Ok(self
            .admins
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn count_admins(&self) -> Result<i64, Error> {
        Ok(self.admins.lock().unwrap().len() as i64)
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), Error> {
        self.admins.lock().unwrap().push(admin.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}
