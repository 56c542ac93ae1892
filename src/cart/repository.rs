use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::cart::error::CartError;
use crate::cart::models::{Cart, CartItem, CartItemModifier};
use crate::models::{
    Address, Branch, BranchSchedule, ModifierGroup, ModifierOption, Product, Restaurant,
};

/// Read-side repository for the catalog entities cart and checkout validate
/// against (products, modifier groups/options, restaurants, branches).
#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_product(&self, id: i32) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, restaurant_id, subcategory_id, name, description, price, is_available
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_restaurant(&self, id: i32) -> Result<Option<Restaurant>, sqlx::Error> {
        sqlx::query_as::<_, Restaurant>(
            "SELECT id, name, commission_rate, status FROM restaurants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Modifier groups linked to a product through the join table
    pub async fn groups_for_product(
        &self,
        product_id: i32,
    ) -> Result<Vec<ModifierGroup>, sqlx::Error> {
        sqlx::query_as::<_, ModifierGroup>(
            r#"
            SELECT mg.id, mg.restaurant_id, mg.name, mg.min_selection, mg.max_selection
            FROM modifier_groups mg
            JOIN product_modifier_groups pmg ON pmg.modifier_group_id = mg.id
            WHERE pmg.product_id = $1
            ORDER BY mg.id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Active modifier options by id
    pub async fn find_options(&self, ids: &[i32]) -> Result<Vec<ModifierOption>, sqlx::Error> {
        sqlx::query_as::<_, ModifierOption>(
            r#"
            SELECT id, modifier_group_id, name, price_delta, is_active
            FROM modifier_options
            WHERE id = ANY($1) AND is_active
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_branch(&self, id: i32) -> Result<Option<Branch>, sqlx::Error> {
        sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, restaurant_id, name, latitude, longitude, uses_platform_drivers,
                   delivery_fee_base, estimated_delivery_min, estimated_delivery_max,
                   delivery_radius_km, status
            FROM branches
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn active_branches_of_restaurant(
        &self,
        restaurant_id: i32,
    ) -> Result<Vec<Branch>, sqlx::Error> {
        sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, restaurant_id, name, latitude, longitude, uses_platform_drivers,
                   delivery_fee_base, estimated_delivery_min, estimated_delivery_max,
                   delivery_radius_km, status
            FROM branches
            WHERE restaurant_id = $1 AND status = 'active'
            ORDER BY id
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await
    }

    /// The single schedule record for (branch, day_of_week 0-6)
    pub async fn schedule_for(
        &self,
        branch_id: i32,
        day_of_week: i16,
    ) -> Result<Option<BranchSchedule>, sqlx::Error> {
        sqlx::query_as::<_, BranchSchedule>(
            r#"
            SELECT id, branch_id, day_of_week, opening_time, closing_time, is_closed
            FROM branch_schedules
            WHERE branch_id = $1 AND day_of_week = $2
            "#,
        )
        .bind(branch_id)
        .bind(day_of_week)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_address(&self, id: i32) -> Result<Option<Address>, sqlx::Error> {
        sqlx::query_as::<_, Address>(
            "SELECT id, user_id, label, street, city, latitude, longitude FROM addresses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Row of the grouped cart listing (cart × item × product × restaurant)
#[derive(Debug, sqlx::FromRow)]
pub struct CartListRow {
    pub cart_id: i32,
    pub restaurant_id: i32,
    pub restaurant_name: String,
    pub item_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_add: Decimal,
}

/// Modifier row joined with its option for rendering cart lines
#[derive(Debug, sqlx::FromRow)]
pub struct CartModifierRow {
    pub cart_item_id: i32,
    pub modifier_option_id: i32,
    pub name: String,
    pub price_delta: Decimal,
}

/// Repository for cart persistence
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the user's cart for a restaurant, creating it if absent.
    /// The unique constraint on (user_id, restaurant_id) makes the insert
    /// race-safe under concurrent adds.
    pub async fn get_or_create_cart(
        &self,
        user_id: i32,
        restaurant_id: i32,
    ) -> Result<Cart, CartError> {
        sqlx::query(
            r#"
            INSERT INTO carts (user_id, restaurant_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, restaurant_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(restaurant_id)
        .execute(&self.pool)
        .await?;

        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, user_id, restaurant_id, created_at
            FROM carts
            WHERE user_id = $1 AND restaurant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(cart)
    }

    pub async fn items_of_cart(&self, cart_id: i32) -> Result<Vec<CartItem>, CartError> {
        let items = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, cart_id, product_id, quantity, price_at_add
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Modifier rows of every item in a cart
    pub async fn modifiers_of_cart(
        &self,
        cart_id: i32,
    ) -> Result<Vec<CartItemModifier>, CartError> {
        let rows = sqlx::query_as::<_, CartItemModifier>(
            r#"
            SELECT cim.id, cim.cart_item_id, cim.modifier_option_id
            FROM cart_item_modifiers cim
            JOIN cart_items ci ON ci.id = cim.cart_item_id
            WHERE ci.cart_id = $1
            ORDER BY cim.id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert a cart line together with its modifier rows
    pub async fn insert_item(
        &self,
        cart_id: i32,
        product_id: i32,
        quantity: i32,
        price_at_add: Decimal,
        option_ids: &[i32],
    ) -> Result<CartItem, CartError> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity, price_at_add)
            VALUES ($1, $2, $3, $4)
            RETURNING id, cart_id, product_id, quantity, price_at_add
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price_at_add)
        .fetch_one(&mut *tx)
        .await?;

        for option_id in option_ids {
            sqlx::query(
                "INSERT INTO cart_item_modifiers (cart_item_id, modifier_option_id) VALUES ($1, $2)",
            )
            .bind(item.id)
            .bind(option_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(item)
    }

    /// Add to an existing line's quantity, capped at 99
    pub async fn increment_quantity(&self, item_id: i32, by: i32) -> Result<CartItem, CartError> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items
            SET quantity = LEAST(quantity + $2, 99)
            WHERE id = $1
            RETURNING id, cart_id, product_id, quantity, price_at_add
            "#,
        )
        .bind(item_id)
        .bind(by)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CartError::ItemNotFound)?;

        Ok(item)
    }

    pub async fn set_quantity(&self, item_id: i32, quantity: i32) -> Result<CartItem, CartError> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items
            SET quantity = $2
            WHERE id = $1
            RETURNING id, cart_id, product_id, quantity, price_at_add
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CartError::ItemNotFound)?;

        Ok(item)
    }

    /// A cart item only if it belongs to one of the user's carts
    pub async fn find_item_owned(
        &self,
        item_id: i32,
        user_id: i32,
    ) -> Result<Option<CartItem>, CartError> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.price_at_add
            FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            WHERE ci.id = $1 AND c.user_id = $2
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    pub async fn delete_item(&self, item_id: i32) -> Result<(), CartError> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remove every cart the user owns. Items and modifiers cascade, so a
    /// single statement keeps the clear atomic under concurrent adds.
    pub async fn clear_all(&self, user_id: i32) -> Result<u64, CartError> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Remove the user's cart for one restaurant
    pub async fn clear_restaurant(
        &self,
        user_id: i32,
        restaurant_id: i32,
    ) -> Result<u64, CartError> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1 AND restaurant_id = $2")
            .bind(user_id)
            .bind(restaurant_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Flat rows for the grouped cart listing
    pub async fn list_rows(&self, user_id: i32) -> Result<Vec<CartListRow>, CartError> {
        let rows = sqlx::query_as::<_, CartListRow>(
            r#"
            SELECT c.id AS cart_id, c.restaurant_id, r.name AS restaurant_name,
                   ci.id AS item_id, ci.product_id, p.name AS product_name,
                   ci.quantity, ci.price_at_add
            FROM carts c
            JOIN restaurants r ON r.id = c.restaurant_id
            JOIN cart_items ci ON ci.cart_id = c.id
            JOIN products p ON p.id = ci.product_id
            WHERE c.user_id = $1
            ORDER BY c.id, ci.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Modifier rows for every item in the user's carts
    pub async fn modifier_rows(&self, user_id: i32) -> Result<Vec<CartModifierRow>, CartError> {
        let rows = sqlx::query_as::<_, CartModifierRow>(
            r#"
            SELECT cim.cart_item_id, cim.modifier_option_id, mo.name, mo.price_delta
            FROM cart_item_modifiers cim
            JOIN cart_items ci ON ci.id = cim.cart_item_id
            JOIN carts c ON c.id = ci.cart_id
            JOIN modifier_options mo ON mo.id = cim.modifier_option_id
            WHERE c.user_id = $1
            ORDER BY cim.cart_item_id, cim.modifier_option_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
