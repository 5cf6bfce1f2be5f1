use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartDto, CartItemDto, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, Product},
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartLineRow {
    item_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
    category_id: Option<Uuid>,
    rating: f32,
    num_reviews: i32,
    product_created_at: DateTime<Utc>,
}

async fn find_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Option<Cart>> {
    let cart: Option<Cart> = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(cart)
}

// Carts come into existence on first access, not at registration.
async fn get_or_create_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Cart> {
    if let Some(cart) = find_cart(pool, user_id).await? {
        return Ok(cart);
    }

    let cart: Cart = sqlx::query_as("INSERT INTO carts (id, user_id) VALUES ($1, $2) RETURNING *")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(cart)
}

async fn require_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Cart> {
    find_cart(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".into()))
}

async fn touch_cart(pool: &DbPool, cart_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE carts SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Re-read the cart with its lines and the referenced product rows.
async fn load_cart_dto(pool: &DbPool, cart_id: Uuid) -> AppResult<CartDto> {
    let cart: Cart = sqlx::query_as("SELECT * FROM carts WHERE id = $1")
        .bind(cart_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id AS item_id, ci.quantity,
               p.id AS product_id, p.name, p.description, p.price, p.stock,
               p.category_id, p.rating, p.num_reviews,
               p.created_at AS product_created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.item_id,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price: row.price,
                stock: row.stock,
                category_id: row.category_id,
                rating: row.rating,
                num_reviews: row.num_reviews,
                created_at: row.product_created_at,
            },
            quantity: row.quantity,
        })
        .collect();

    Ok(CartDto {
        id: cart.id,
        user_id: cart.user_id,
        items,
        updated_at: cart.updated_at,
    })
}

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    let dto = load_cart_dto(pool, cart.id).await?;
    Ok(ApiResponse::success("OK", dto, None))
}

pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartDto>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".into())),
    };

    // The stock check covers the increment only, not the merged line total.
    if product.stock < payload.quantity {
        return Err(AppError::BadRequest("Insufficient stock".into()));
    }

    let cart = get_or_create_cart(pool, user.user_id).await?;

    // Same product twice merges into one line with the quantities summed.
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart.id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .execute(pool)
    .await?;

    touch_cart(pool, cart.id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let dto = load_cart_dto(pool, cart.id).await?;
    Ok(ApiResponse::success("OK", dto, None))
}

pub async fn update_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let cart = require_cart(pool, user.user_id).await?;

    let item: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    if item.is_none() {
        return Err(AppError::NotFound("Item not found in cart".into()));
    }

    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".into())),
    };

    if product.stock < payload.quantity {
        return Err(AppError::BadRequest("Insufficient stock".into()));
    }

    sqlx::query("UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2")
        .bind(cart.id)
        .bind(product_id)
        .bind(payload.quantity)
        .execute(pool)
        .await?;

    touch_cart(pool, cart.id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let dto = load_cart_dto(pool, cart.id).await?;
    Ok(ApiResponse::success("OK", dto, None))
}

pub async fn remove_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartDto>> {
    let cart = require_cart(pool, user.user_id).await?;

    // Removing a line that is not there is not an error; the cart is returned
    // either way.
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart.id)
        .bind(product_id)
        .execute(pool)
        .await?;

    touch_cart(pool, cart.id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let dto = load_cart_dto(pool, cart.id).await?;
    Ok(ApiResponse::success("Removed from cart", dto, None))
}

pub async fn clear_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let cart = require_cart(pool, user.user_id).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart.id)
        .execute(pool)
        .await?;

    touch_cart(pool, cart.id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_clear",
        Some("cart_items"),
        Some(serde_json::json!({ "cart_id": cart.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let dto = load_cart_dto(pool, cart.id).await?;
    Ok(ApiResponse::success(
        "Cart cleared",
        dto,
        Some(Meta::empty()),
    ))
}
