use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, info};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{
    ActivityEntry, AdminStats, AnalyticsApi, ApiError, FileDetail, FileRecord, LoginResponse,
    ProfileUpdate, User, UserRole, UserStatus,
};
use crate::preview::{PREVIEW_ROWS, SheetPreview};

const DEMO_SALES_CSV: &str = "Month,Revenue,Expenses,Customers\n\
Jan,4200,3100,120\nFeb,4800,3300,134\nMar,5100,3500,141\nApr,4700,3400,138\n\
May,5600,3700,152\nJun,6100,3900,167\nJul,6400,4100,171\nAug,6000,4000,165\n";

struct Account {
    user: User,
    /// Demo credentials only; this store never leaves the process
    password: String,
}

struct StoredFile {
    record: FileRecord,
    owner_id: String,
    preview: Option<SheetPreview>,
}

#[derive(Default)]
struct MemoryData {
    accounts: Vec<Account>,
    files: Vec<StoredFile>,
    activity: Vec<ActivityEntry>,
    tokens: HashMap<String, String>,
    next_id: u64,
}

impl MemoryData {
    fn next_object_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:024x}", 0x64b7_f000_0000_u64 + self.next_id)
    }

    fn account_for_token(&self, token: &str) -> Result<&Account, ApiError> {
        let user_id = self.tokens.get(token).ok_or(ApiError::Unauthorized)?;
        self.accounts
            .iter()
            .find(|a| &a.user.id == user_id)
            .ok_or(ApiError::Unauthorized)
    }

    fn require_user(&self, token: &str) -> Result<User, ApiError> {
        let account = self.account_for_token(token)?;
        if account.user.status == UserStatus::Inactive {
            return Err(forbidden("Account is deactivated"));
        }
        Ok(account.user.clone())
    }

    fn require_admin(&self, token: &str) -> Result<User, ApiError> {
        let user = self.require_user(token)?;
        if !user.is_admin() {
            return Err(forbidden("Admin access required"));
        }
        Ok(user)
    }

    fn account_mut(&mut self, id: &str) -> Result<&mut Account, ApiError> {
        self.accounts
            .iter_mut()
            .find(|a| a.user.id == id)
            .ok_or_else(|| ApiError::NotFound("User".to_string()))
    }

    fn log(&mut self, user: &User, action: &str, details: Option<String>) {
        let id = self.next_object_id();
        self.activity.push(ActivityEntry {
            id,
            user: Some(user.name.clone()),
            action: action.to_string(),
            details,
            timestamp: Utc::now(),
        });
    }
}

fn forbidden(message: &str) -> ApiError {
    ApiError::Status {
        status: 403,
        message: message.to_string(),
    }
}

fn bad_request(message: &str) -> ApiError {
    ApiError::Status {
        status: 400,
        message: message.to_string(),
    }
}

/// Seeded in-process backend.
///
/// Used when no backend URL is configured and by the test-suite. Demo logins are
/// `admin@excelanalytics.dev` / `admin123` and `jane@excelanalytics.dev` / `user123`.
pub struct MemoryApi {
    data: Mutex<MemoryData>,
}

impl Default for MemoryApi {
    fn default() -> Self {
        Self::seeded()
    }
}

impl MemoryApi {
    /// Empty store with no accounts
    pub fn empty() -> Self {
        MemoryApi {
            data: Mutex::new(MemoryData::default()),
        }
    }

    pub fn seeded() -> Self {
        let api = Self::empty();
        let now = Utc::now();
        {
            let mut data = api.lock();
            let people = [
                ("Admin User", "admin@excelanalytics.dev", "admin123", UserRole::Admin, UserStatus::Active),
                ("Jane Cooper", "jane@excelanalytics.dev", "user123", UserRole::User, UserStatus::Active),
                ("Ravi Patel", "ravi@excelanalytics.dev", "user123", UserRole::User, UserStatus::Active),
                ("Lena Fischer", "lena@excelanalytics.dev", "user123", UserRole::User, UserStatus::Inactive),
            ];
            for (i, (name, email, password, role, status)) in people.into_iter().enumerate() {
                let id = data.next_object_id();
                data.accounts.push(Account {
                    user: User {
                        id,
                        name: name.to_string(),
                        email: email.to_string(),
                        role,
                        status,
                        created_at: Some(now - Duration::days(30 - i as i64 * 5)),
                        last_login: None,
                    },
                    password: password.to_string(),
                });
            }

            let jane = data.accounts[1].user.clone();
            let file_id = data.next_object_id();
            data.files.push(StoredFile {
                record: FileRecord {
                    id: file_id,
                    filename: "monthly-sales.csv".to_string(),
                    size: DEMO_SALES_CSV.len() as u64,
                    uploaded_at: Some(now - Duration::days(2)),
                    owner: Some(jane.name.clone()),
                },
                owner_id: jane.id.clone(),
                preview: SheetPreview::from_csv(DEMO_SALES_CSV, PREVIEW_ROWS).ok(),
            });
            data.log(&jane, "upload", Some("monthly-sales.csv".to_string()));
        }
        api
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Issues a token for an existing account without a password check
    pub fn token_for(&self, email: &str) -> Option<String> {
        let mut data = self.lock();
        let id = data.accounts.iter().find(|a| a.user.email == email)?.user.id.clone();
        let token = Uuid::new_v4().to_string();
        data.tokens.insert(token.clone(), id);
        Some(token)
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.lock()
            .accounts
            .iter()
            .find(|a| a.user.email == email)
            .map(|a| a.user.clone())
    }

    pub fn file_ids(&self) -> Vec<String> {
        self.lock().files.iter().map(|f| f.record.id.clone()).collect()
    }
}

#[async_trait]
impl AnalyticsApi for MemoryApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let mut data = self.lock();
        let email = email.trim().to_ascii_lowercase();
        let account = data
            .accounts
            .iter_mut()
            .find(|a| a.user.email == email && a.password == password)
            .ok_or_else(|| ApiError::Status {
                status: 401,
                message: "Invalid email or password".to_string(),
            })?;
        if account.user.status == UserStatus::Inactive {
            return Err(forbidden("Account is deactivated"));
        }
        account.user.last_login = Some(Utc::now());
        let user = account.user.clone();

        let token = Uuid::new_v4().to_string();
        data.tokens.insert(token.clone(), user.id.clone());
        data.log(&user, "login", None);
        info!("demo backend: {} signed in", user.email);
        Ok(LoginResponse { token, user })
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        self.lock().require_user(token)
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<User, ApiError> {
        let mut data = self.lock();
        let me = data.require_user(token)?;
        let name = update.name.trim();
        let email = update.email.trim().to_ascii_lowercase();
        if name.is_empty() || !email.contains('@') {
            return Err(bad_request("Name and a valid email are required"));
        }
        if data.accounts.iter().any(|a| a.user.email == email && a.user.id != me.id) {
            return Err(bad_request("Email address is already registered"));
        }
        let account = data.account_mut(&me.id)?;
        account.user.name = name.to_string();
        account.user.email = email;
        let user = account.user.clone();
        data.log(&user, "profile_update", None);
        Ok(user)
    }

    async fn upload_file(&self, token: &str, filename: &str, data_bytes: Vec<u8>) -> Result<Value, ApiError> {
        let mut data = self.lock();
        let me = data.require_user(token)?;
        let preview = match SheetPreview::from_bytes(filename, &data_bytes, PREVIEW_ROWS) {
            Ok(preview) => Some(preview),
            Err(e) => {
                debug!("no preview for {:?}: {}", filename, e);
                None
            }
        };
        let id = data.next_object_id();
        let record = FileRecord {
            id: id.clone(),
            filename: filename.to_string(),
            size: data_bytes.len() as u64,
            uploaded_at: Some(Utc::now()),
            owner: Some(me.name.clone()),
        };
        data.files.push(StoredFile {
            record: record.clone(),
            owner_id: me.id.clone(),
            preview,
        });
        data.log(&me, "upload", Some(filename.to_string()));
        Ok(json!({ "message": "File uploaded successfully", "file": { "_id": id, "filename": record.filename } }))
    }

    async fn list_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError> {
        let data = self.lock();
        let me = data.require_user(token)?;
        Ok(data
            .files
            .iter()
            .filter(|f| f.owner_id == me.id)
            .map(|f| f.record.clone())
            .collect())
    }

    async fn get_file(&self, token: &str, id: &str) -> Result<FileDetail, ApiError> {
        let data = self.lock();
        let me = data.require_user(token)?;
        data.files
            .iter()
            .find(|f| f.record.id == id && (f.owner_id == me.id || me.is_admin()))
            .map(|f| FileDetail {
                record: f.record.clone(),
                preview: f.preview.clone(),
            })
            .ok_or_else(|| ApiError::NotFound("File".to_string()))
    }

    async fn delete_file(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let mut data = self.lock();
        let me = data.require_user(token)?;
        let pos = data
            .files
            .iter()
            .position(|f| f.record.id == id && f.owner_id == me.id)
            .ok_or_else(|| ApiError::NotFound("File".to_string()))?;
        let removed = data.files.remove(pos);
        data.log(&me, "delete_file", Some(removed.record.filename));
        Ok(())
    }

    async fn admin_stats(&self, token: &str) -> Result<AdminStats, ApiError> {
        let data = self.lock();
        data.require_admin(token)?;
        let users = data.accounts.iter().map(|a| &a.user);
        Ok(AdminStats {
            total_users: data.accounts.len() as u64,
            active_users: users.clone().filter(|u| u.status == UserStatus::Active).count() as u64,
            admin_users: users.filter(|u| u.is_admin()).count() as u64,
            total_files: data.files.len() as u64,
            total_storage: data.files.iter().map(|f| f.record.size).sum(),
        })
    }

    async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError> {
        let data = self.lock();
        data.require_admin(token)?;
        Ok(data.accounts.iter().map(|a| a.user.clone()).collect())
    }

    async fn get_user(&self, token: &str, id: &str) -> Result<User, ApiError> {
        let data = self.lock();
        data.require_admin(token)?;
        data.accounts
            .iter()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone())
            .ok_or_else(|| ApiError::NotFound("User".to_string()))
    }

    async fn set_user_role(&self, token: &str, id: &str, role: UserRole) -> Result<User, ApiError> {
        let mut data = self.lock();
        let me = data.require_admin(token)?;
        let account = data.account_mut(id)?;
        account.user.role = role;
        let user = account.user.clone();
        data.log(&me, "role_change", Some(format!("{} -> {}", user.email, role.as_str())));
        Ok(user)
    }

    async fn set_user_status(&self, token: &str, id: &str, status: UserStatus) -> Result<User, ApiError> {
        let mut data = self.lock();
        let me = data.require_admin(token)?;
        let account = data.account_mut(id)?;
        account.user.status = status;
        let user = account.user.clone();
        if status == UserStatus::Inactive {
            data.tokens.retain(|_, uid| uid != &user.id);
        }
        data.log(&me, "status_change", Some(format!("{} -> {}", user.email, status.as_str())));
        Ok(user)
    }

    async fn delete_user(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let mut data = self.lock();
        let me = data.require_admin(token)?;
        let pos = data
            .accounts
            .iter()
            .position(|a| a.user.id == id)
            .ok_or_else(|| ApiError::NotFound("User".to_string()))?;
        let removed = data.accounts.remove(pos);
        data.files.retain(|f| f.owner_id != removed.user.id);
        data.tokens.retain(|_, uid| uid != &removed.user.id);
        data.log(&me, "delete_user", Some(removed.user.email));
        Ok(())
    }

    async fn list_all_files(&self, token: &str) -> Result<Vec<FileRecord>, ApiError> {
        let data = self.lock();
        data.require_admin(token)?;
        Ok(data.files.iter().map(|f| f.record.clone()).collect())
    }

    async fn admin_delete_file(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let mut data = self.lock();
        let me = data.require_admin(token)?;
        let pos = data
            .files
            .iter()
            .position(|f| f.record.id == id)
            .ok_or_else(|| ApiError::NotFound("File".to_string()))?;
        let removed = data.files.remove(pos);
        data.log(&me, "delete_file", Some(removed.record.filename));
        Ok(())
    }

    async fn list_activity(&self, token: &str) -> Result<Vec<ActivityEntry>, ApiError> {
        let data = self.lock();
        data.require_admin(token)?;
        // newest first
        Ok(data.activity.iter().rev().cloned().collect())
    }
}
