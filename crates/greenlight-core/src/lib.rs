//! Core types and utilities for greenlight.
//!
//! This crate provides the foundational types used throughout the greenlight API:
//!
//! - **Validation**: `Validator`, `ValidationErrors`
//! - **Listing**: `Filters`, `SortDirection`, `Metadata`
//! - **Movies**: `Movie`, `NewMovie`, `Runtime`
//! - **Translations**: `Language`, `Translation`, `Category`, `Item`
//! - **Accounts**: `User`, `NewUser`, `Token`, `TokenScope`
//!
//! Nothing in here performs I/O. Persistence lives in `greenlight-store`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod filters;
pub mod language;
pub mod movie;
pub mod token;
pub mod translation;
pub mod user;
pub mod validator;

pub use error::{CoreError, Result};
pub use filters::{validate_filters, Filters, Metadata, SortDirection, MAX_PAGE, MAX_PAGE_SIZE};
pub use language::{validate_language, Language};
pub use movie::{Movie, NewMovie, Runtime};
pub use token::{
    hash_plaintext, validate_token_plaintext, validate_token_plaintext_for, Token, TokenScope,
    ACTIVATION_TOKEN_LEN, AUTHENTICATION_TOKEN_LEN,
};
pub use translation::{
    Category, Item, Translation, TranslationPolicy, UntranslatedItem, DEFAULT_CATEGORY_ID,
};
pub use user::{
    hash_password, validate_email, validate_password_plaintext, verify_password, NewUser, User,
};
pub use validator::{matches_email, permitted_value, unique, ValidationErrors, Validator};
