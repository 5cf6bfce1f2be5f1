//! Local state containers: the session (token + user) and the offline cart a
//! front end keeps between page loads. Each container owns its backing file
//! and is loaded explicitly and passed to whatever needs it, never held in a
//! process-wide singleton. Concurrent writers of the same file are
//! last-writer-wins.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::cart::CartDto;
use crate::models::User;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
}

/// Holds the bearer token and the signed-in user, persisted as JSON.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    state: SessionState,
}

impl SessionStore {
    /// A missing or unreadable file yields a signed-out store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = read_json(&path).unwrap_or_default();
        Self { path, state }
    }

    pub fn save(&self) -> Result<()> {
        write_json(&self.path, &self.state)
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.state
            .user
            .as_ref()
            .map(|u| u.role == "admin")
            .unwrap_or(false)
    }

    pub fn sign_in(&mut self, token: String, user: User) {
        self.state.token = Some(token);
        self.state.user = Some(user);
    }

    pub fn sign_out(&mut self) {
        self.state = SessionState::default();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCartItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

/// The cart as the front end remembers it between page loads.
#[derive(Debug)]
pub struct CartStore {
    path: PathBuf,
    items: Vec<StoredCartItem>,
}

impl CartStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = read_json(&path).unwrap_or_default();
        Self { path, items }
    }

    pub fn save(&self) -> Result<()> {
        write_json(&self.path, &self.items)
    }

    pub fn items(&self) -> &[StoredCartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adding a product already present merges into one line with the
    /// quantities summed; there are never duplicate lines.
    pub fn add_item(&mut self, product_id: Uuid, name: &str, price: i64, quantity: i32) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity += quantity;
        } else {
            self.items.push(StoredCartItem {
                product_id,
                name: name.to_string(),
                price,
                quantity,
            });
        }
    }

    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity;
        }
    }

    pub fn remove_item(&mut self, product_id: Uuid) {
        self.items.retain(|i| i.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// What checkout submits as the order total.
    pub fn total(&self) -> i64 {
        self.items
            .iter()
            .map(|i| i.price * (i.quantity as i64))
            .sum()
    }

    /// Replace local state with the server's cart, e.g. after sign-in.
    pub fn sync_from(&mut self, cart: &CartDto) {
        self.items = cart
            .items
            .iter()
            .map(|line| StoredCartItem {
                product_id: line.product.id,
                name: line.product.name.clone(),
                price: line.product.price,
                quantity: line.quantity,
            })
            .collect();
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}.json", name, Uuid::new_v4()))
    }

    #[test]
    fn add_item_merges_duplicate_products() {
        let mut cart = CartStore::load(temp_path("cart"));
        let product_id = Uuid::new_v4();

        cart.add_item(product_id, "Widget", 1000, 2);
        cart.add_item(product_id, "Widget", 1000, 2);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 4);
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let mut cart = CartStore::load(temp_path("cart"));
        cart.add_item(Uuid::new_v4(), "Widget", 1000, 2);
        cart.add_item(Uuid::new_v4(), "Gadget", 250, 3);

        assert_eq!(cart.total(), 2 * 1000 + 3 * 250);
    }

    #[test]
    fn set_quantity_zero_removes_the_line() {
        let mut cart = CartStore::load(temp_path("cart"));
        let product_id = Uuid::new_v4();
        cart.add_item(product_id, "Widget", 1000, 2);

        cart.set_quantity(product_id, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn cart_round_trips_through_disk() {
        let path = temp_path("cart");
        let product_id = Uuid::new_v4();

        let mut cart = CartStore::load(&path);
        cart.add_item(product_id, "Widget", 1000, 2);
        cart.save().unwrap();

        let reloaded = CartStore::load(&path);
        assert_eq!(reloaded.items(), cart.items());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let path = temp_path("cart");
        std::fs::write(&path, b"not json").unwrap();

        let cart = CartStore::load(&path);
        assert!(cart.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn session_sign_in_and_out() {
        let path = temp_path("session");
        let mut session = SessionStore::load(&path);
        assert!(session.token().is_none());

        let user: User = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Ada",
            "email": "ada@example.com",
            "role": "admin",
            "status": "active",
            "address": null,
            "created_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();

        session.sign_in("token123".into(), user);
        assert_eq!(session.token(), Some("token123"));
        assert!(session.is_admin());
        session.save().unwrap();

        let reloaded = SessionStore::load(&path);
        assert_eq!(reloaded.token(), Some("token123"));

        let mut session = reloaded;
        session.sign_out();
        assert!(session.token().is_none());
        assert!(!session.is_admin());

        std::fs::remove_file(&path).ok();
    }
}
