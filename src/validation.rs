use std::sync::OnceLock;

use regex::Regex;

use crate::models::Role;

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
    })
}

fn phone_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?1?\d{9,15}$").unwrap())
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone_pattern().is_match(phone)
}

pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    role: &str,
    phone: Option<&str>,
) -> Vec<String> {
    let mut errors = Vec::new();

    if name.trim().len() < 2 {
        errors.push("Name must be at least 2 characters long".to_string());
    }
    if !is_valid_email(email) {
        errors.push("Valid email is required".to_string());
    }
    if password.len() < 6 {
        errors.push("Password must be at least 6 characters long".to_string());
    }
    if Role::parse(role).is_none() {
        errors.push("Role must be either \"provider\" or \"buyer\"".to_string());
    }
    if let Some(phone) = phone {
        if !phone.is_empty() && !is_valid_phone(phone) {
            errors.push("Valid phone number is required".to_string());
        }
    }

    errors
}

pub fn validate_service(
    title: &str,
    description: &str,
    category: &str,
    price: f64,
    city: &str,
) -> Vec<String> {
    let mut errors = Vec::new();

    if title.trim().len() < 5 {
        errors.push("Title must be at least 5 characters long".to_string());
    }
    if description.trim().len() < 10 {
        errors.push("Description must be at least 10 characters long".to_string());
    }
    if category.trim().is_empty() {
        errors.push("Category is required".to_string());
    }
    if price <= 0.0 {
        errors.push("Valid price is required".to_string());
    }
    if city.trim().is_empty() {
        errors.push("City is required".to_string());
    }

    errors
}
