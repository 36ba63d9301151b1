use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::Capability;

pub type UserId = i64;

pub const PHONE_MAX_LEN: usize = 15;
pub const FULL_NAME_MAX_LEN: usize = 255;
pub const CAR_MODEL_MAX_LEN: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    TaxiDriver,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::TaxiDriver => "taxi_driver",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            Role::Customer => Capability::Customer,
            Role::TaxiDriver => Capability::TaxiDriver,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "taxi_driver" => Ok(Role::TaxiDriver),
            other => Err(format!("unknown role {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub phone_number: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i32>,
    pub car_model: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied at registration. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_number: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i32>,
    pub car_model: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(
        phone_number: String,
        role: Role,
        full_name: Option<String>,
        gender: Option<Gender>,
        age: Option<i32>,
        car_model: Option<String>,
        password_hash: String,
    ) -> anyhow::Result<Self> {
        let phone_number = phone_number.trim().to_string();
        if phone_number.is_empty() {
            anyhow::bail!("phone_number is required");
        }
        if phone_number.chars().count() > PHONE_MAX_LEN {
            anyhow::bail!("phone_number longer than {PHONE_MAX_LEN} characters");
        }
        if full_name
            .as_deref()
            .is_some_and(|n| n.chars().count() > FULL_NAME_MAX_LEN)
        {
            anyhow::bail!("full_name longer than {FULL_NAME_MAX_LEN} characters");
        }
        if car_model
            .as_deref()
            .is_some_and(|m| m.chars().count() > CAR_MODEL_MAX_LEN)
        {
            anyhow::bail!("car_model longer than {CAR_MODEL_MAX_LEN} characters");
        }
        if age.is_some_and(|a| a < 0) {
            anyhow::bail!("age must not be negative");
        }
        Ok(Self {
            phone_number,
            role,
            full_name,
            gender,
            age,
            car_model,
            password_hash,
            created_at: Utc::now(),
        })
    }

    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            phone_number: self.phone_number,
            role: self.role,
            full_name: self.full_name,
            gender: self.gender,
            age: self.age,
            car_model: self.car_model,
            password_hash: self.password_hash,
            is_active: true,
            is_staff: false,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(phone: &str) -> anyhow::Result<NewUser> {
        NewUser::new(
            phone.into(),
            Role::Customer,
            Some("Ann".into()),
            Some(Gender::Female),
            Some(30),
            None,
            "hash".into(),
        )
    }

    #[test]
    fn phone_is_required_and_bounded() {
        assert!(new_user("").is_err());
        assert!(new_user("   ").is_err());
        assert!(new_user("+1234567890123456").is_err());
        let ok = new_user(" +1000 ").unwrap();
        assert_eq!(ok.phone_number, "+1000");
    }

    #[test]
    fn fresh_user_is_active_and_not_staff() {
        let user = new_user("+1000").unwrap().into_user(5);
        assert_eq!(user.id, 5);
        assert!(user.is_active);
        assert!(!user.is_staff);
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = new_user("+1000").unwrap().into_user(1);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "customer");
        assert_eq!(json["gender"], "female");
    }

    #[test]
    fn role_maps_to_capability() {
        assert_eq!(Role::Customer.capability(), Capability::Customer);
        assert_eq!(Role::TaxiDriver.capability(), Capability::TaxiDriver);
        assert_eq!("taxi_driver".parse::<Role>().unwrap(), Role::TaxiDriver);
        assert!("admin".parse::<Role>().is_err());
    }
}
