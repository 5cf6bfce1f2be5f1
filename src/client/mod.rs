//! Typed client for the storefront REST API plus the local state containers
//! a front end keeps between requests. Credentials live in [`ClientConfig`]
//! and are attached per request; there is no process-global header state.

pub mod store;

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartDto, UpdateCartItemRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        orders::{
            CreateOrderRequest, OrderList, OrderStatsResponse, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{AdminUpdateUserRequest, UpdateProfileRequest, UserList},
        wishlist::WishlistProductList,
    },
    models::{Category, Order, Product, User, WishlistItem},
    response::ApiResponse,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer; `message` is the server's message string verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("response body had no data")]
    EmptyBody,
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Query parameters accepted by the product list and search endpoints.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ProductFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct StorefrontClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl StorefrontClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Swap the credentials without rebuilding the connection pool.
    pub fn set_token(&mut self, token: Option<String>) {
        self.config.token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ClientResult<T> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = response.json().await?;
        envelope.data.ok_or(ClientError::EmptyBody)
    }

    // Auth

    pub async fn register(&self, payload: &RegisterRequest) -> ClientResult<AuthResponse> {
        self.send(self.request(Method::POST, "/api/auth/register").json(payload))
            .await
    }

    pub async fn login(&self, payload: &LoginRequest) -> ClientResult<AuthResponse> {
        self.send(self.request(Method::POST, "/api/auth/login").json(payload))
            .await
    }

    pub async fn me(&self) -> ClientResult<User> {
        self.send(self.request(Method::GET, "/api/auth/me")).await
    }

    // Products

    pub async fn list_products(&self, filter: &ProductFilter) -> ClientResult<Vec<Product>> {
        let list: ProductList = self
            .send(self.request(Method::GET, "/api/products").query(filter))
            .await?;
        Ok(list.items)
    }

    pub async fn search_products(&self, filter: &ProductFilter) -> ClientResult<Vec<Product>> {
        let list: ProductList = self
            .send(
                self.request(Method::GET, "/api/products/search")
                    .query(filter),
            )
            .await?;
        Ok(list.items)
    }

    pub async fn products_by_category(&self, category_id: Uuid) -> ClientResult<Vec<Product>> {
        let list: ProductList = self
            .send(self.request(
                Method::GET,
                &format!("/api/products/category/{category_id}"),
            ))
            .await?;
        Ok(list.items)
    }

    pub async fn get_product(&self, id: Uuid) -> ClientResult<Product> {
        self.send(self.request(Method::GET, &format!("/api/products/{id}")))
            .await
    }

    pub async fn create_product(&self, payload: &CreateProductRequest) -> ClientResult<Product> {
        self.send(self.request(Method::POST, "/api/products").json(payload))
            .await
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        payload: &UpdateProductRequest,
    ) -> ClientResult<Product> {
        self.send(
            self.request(Method::PUT, &format!("/api/products/{id}"))
                .json(payload),
        )
        .await
    }

    pub async fn delete_product(&self, id: Uuid) -> ClientResult<serde_json::Value> {
        self.send(self.request(Method::DELETE, &format!("/api/products/{id}")))
            .await
    }

    // Categories

    pub async fn list_categories(&self) -> ClientResult<Vec<Category>> {
        let list: CategoryList = self.send(self.request(Method::GET, "/api/categories")).await?;
        Ok(list.items)
    }

    pub async fn get_category(&self, id: Uuid) -> ClientResult<Category> {
        self.send(self.request(Method::GET, &format!("/api/categories/{id}")))
            .await
    }

    pub async fn create_category(&self, payload: &CreateCategoryRequest) -> ClientResult<Category> {
        self.send(self.request(Method::POST, "/api/categories").json(payload))
            .await
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        payload: &UpdateCategoryRequest,
    ) -> ClientResult<Category> {
        self.send(
            self.request(Method::PUT, &format!("/api/categories/{id}"))
                .json(payload),
        )
        .await
    }

    pub async fn delete_category(&self, id: Uuid) -> ClientResult<serde_json::Value> {
        self.send(self.request(Method::DELETE, &format!("/api/categories/{id}")))
            .await
    }

    // Cart

    pub async fn get_cart(&self) -> ClientResult<CartDto> {
        self.send(self.request(Method::GET, "/api/cart")).await
    }

    pub async fn add_to_cart(&self, product_id: Uuid, quantity: i32) -> ClientResult<CartDto> {
        let payload = AddToCartRequest {
            product_id,
            quantity,
        };
        self.send(self.request(Method::POST, "/api/cart").json(&payload))
            .await
    }

    pub async fn update_cart_item(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> ClientResult<CartDto> {
        let payload = UpdateCartItemRequest { quantity };
        self.send(
            self.request(Method::PUT, &format!("/api/cart/{product_id}"))
                .json(&payload),
        )
        .await
    }

    pub async fn remove_cart_item(&self, product_id: Uuid) -> ClientResult<CartDto> {
        self.send(self.request(Method::DELETE, &format!("/api/cart/{product_id}")))
            .await
    }

    pub async fn clear_cart(&self) -> ClientResult<CartDto> {
        self.send(self.request(Method::DELETE, "/api/cart")).await
    }

    // Orders

    pub async fn create_order(&self, payload: &CreateOrderRequest) -> ClientResult<OrderWithItems> {
        self.send(self.request(Method::POST, "/api/orders").json(payload))
            .await
    }

    pub async fn list_orders(&self) -> ClientResult<Vec<Order>> {
        let list: OrderList = self.send(self.request(Method::GET, "/api/orders")).await?;
        Ok(list.items)
    }

    pub async fn orders_for_user(&self, user_id: Uuid) -> ClientResult<Vec<Order>> {
        let list: OrderList = self
            .send(self.request(Method::GET, &format!("/api/orders/user/{user_id}")))
            .await?;
        Ok(list.items)
    }

    pub async fn get_order(&self, id: Uuid) -> ClientResult<OrderWithItems> {
        self.send(self.request(Method::GET, &format!("/api/orders/{id}")))
            .await
    }

    pub async fn update_order_status(&self, id: Uuid, status: &str) -> ClientResult<Order> {
        let payload = UpdateOrderStatusRequest {
            status: status.to_string(),
        };
        self.send(
            self.request(Method::PATCH, &format!("/api/orders/{id}/status"))
                .json(&payload),
        )
        .await
    }

    pub async fn order_stats(&self) -> ClientResult<OrderStatsResponse> {
        self.send(self.request(Method::GET, "/api/orders/stats"))
            .await
    }

    // Users

    pub async fn list_users(&self) -> ClientResult<Vec<User>> {
        let list: UserList = self.send(self.request(Method::GET, "/api/users")).await?;
        Ok(list.items)
    }

    pub async fn get_user(&self, id: Uuid) -> ClientResult<User> {
        self.send(self.request(Method::GET, &format!("/api/users/{id}")))
            .await
    }

    pub async fn update_profile(&self, payload: &UpdateProfileRequest) -> ClientResult<User> {
        self.send(self.request(Method::PUT, "/api/users/profile").json(payload))
            .await
    }

    pub async fn admin_update_user(
        &self,
        id: Uuid,
        payload: &AdminUpdateUserRequest,
    ) -> ClientResult<User> {
        self.send(
            self.request(Method::PUT, &format!("/api/users/{id}"))
                .json(payload),
        )
        .await
    }

    pub async fn delete_user(&self, id: Uuid) -> ClientResult<serde_json::Value> {
        self.send(self.request(Method::DELETE, &format!("/api/users/{id}")))
            .await
    }

    // Wishlist

    pub async fn wishlist(&self) -> ClientResult<Vec<Product>> {
        let list: WishlistProductList =
            self.send(self.request(Method::GET, "/api/wishlist")).await?;
        Ok(list.items)
    }

    pub async fn add_to_wishlist(&self, product_id: Uuid) -> ClientResult<WishlistItem> {
        self.send(self.request(Method::POST, &format!("/api/wishlist/{product_id}")))
            .await
    }

    pub async fn remove_from_wishlist(&self, product_id: Uuid) -> ClientResult<serde_json::Value> {
        self.send(self.request(Method::DELETE, &format!("/api/wishlist/{product_id}")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = StorefrontClient::new(ClientConfig::new("http://localhost:3000/"));
        assert_eq!(client.url("/api/cart"), "http://localhost:3000/api/cart");

        let client = StorefrontClient::new(ClientConfig::new("http://localhost:3000"));
        assert_eq!(client.url("/api/cart"), "http://localhost:3000/api/cart");
    }

    #[test]
    fn token_lives_in_the_config() {
        let config = ClientConfig::new("http://localhost:3000").with_token("abc");
        assert_eq!(config.token.as_deref(), Some("abc"));

        let mut client = StorefrontClient::new(config);
        client.set_token(None);
        assert!(client.config().token.is_none());
    }
}
