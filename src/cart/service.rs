use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::cart::error::CartError;
use crate::cart::models::{
    AddToCartRequest, CartItem, CartItemModifier, CartItemView, CartListView, CartModifierView,
    RestaurantCartView,
};
use crate::cart::repository::{CartRepository, CatalogRepository};
use crate::models::{ModifierGroup, ModifierOption, Product};
use crate::pricing::CartLine;

/// Service for cart business logic
#[derive(Clone)]
pub struct CartService {
    catalog: CatalogRepository,
    carts: CartRepository,
}

/// Two selections are the same line when their option id sets match
pub(crate) fn same_option_set(a: &[i32], b: &[i32]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    a.dedup();
    b.sort_unstable();
    b.dedup();
    a == b
}

impl CartService {
    pub fn new(catalog: CatalogRepository, carts: CartRepository) -> Self {
        Self { catalog, carts }
    }

    /// Add a product with selected modifier options to the user's cart for
    /// that product's restaurant.
    ///
    /// Validates product availability, restaurant status, and the per-group
    /// selection counts, then either merges into an existing identical line
    /// (quantity capped at 99) or inserts a new one. The unit price is
    /// computed and frozen at this moment.
    pub async fn add(&self, user_id: i32, request: AddToCartRequest) -> Result<CartItem, CartError> {
        let product = self
            .catalog
            .find_product(request.product_id)
            .await?
            .ok_or(CartError::ProductNotFound(request.product_id))?;

        if !product.is_available {
            return Err(CartError::ProductUnavailable(product.id));
        }

        let restaurant = self
            .catalog
            .find_restaurant(product.restaurant_id)
            .await?
            .ok_or(CartError::ProductUnavailable(product.id))?;

        if !restaurant.is_active() {
            return Err(CartError::ProductUnavailable(product.id));
        }

        let mut option_ids = request.modifier_option_ids.clone();
        option_ids.sort_unstable();
        option_ids.dedup();

        let groups = self.catalog.groups_for_product(product.id).await?;
        let options = self.catalog.find_options(&option_ids).await?;
        validate_modifier_selection(&product, &groups, &options, &option_ids)?;

        let price_at_add = CartLine {
            product_id: product.id,
            base_price: product.price,
            modifier_deltas: options.iter().map(|o| o.price_delta).collect(),
            quantity: request.quantity,
        }
        .unit_price()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

        let cart = self
            .carts
            .get_or_create_cart(user_id, product.restaurant_id)
            .await?;

        // Merge with an existing line carrying the same option set
        let existing_items = self.carts.items_of_cart(cart.id).await?;
        let selected_by_item = group_option_ids(self.carts.modifiers_of_cart(cart.id).await?);

        for item in &existing_items {
            if item.product_id != product.id {
                continue;
            }
            let item_options = selected_by_item
                .get(&item.id)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            if same_option_set(item_options, &option_ids) {
                tracing::debug!(
                    "Merging quantity {} into cart item {} for user {}",
                    request.quantity,
                    item.id,
                    user_id
                );
                return self.carts.increment_quantity(item.id, request.quantity).await;
            }
        }

        let item = self
            .carts
            .insert_item(
                cart.id,
                product.id,
                request.quantity,
                price_at_add,
                &option_ids,
            )
            .await?;

        tracing::info!(
            "Added product {} x{} to cart {} for user {}",
            product.id,
            request.quantity,
            cart.id,
            user_id
        );

        Ok(item)
    }

    /// Set a cart line's quantity. Zero removes the line.
    pub async fn update_quantity(
        &self,
        user_id: i32,
        item_id: i32,
        quantity: i32,
    ) -> Result<Option<CartItem>, CartError> {
        let item = self
            .carts
            .find_item_owned(item_id, user_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        if quantity == 0 {
            self.carts.delete_item(item.id).await?;
            return Ok(None);
        }

        let updated = self.carts.set_quantity(item.id, quantity).await?;
        Ok(Some(updated))
    }

    pub async fn remove(&self, user_id: i32, item_id: i32) -> Result<(), CartError> {
        let item = self
            .carts
            .find_item_owned(item_id, user_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        self.carts.delete_item(item.id).await
    }

    /// Clear the user's carts. Without a restaurant filter every cart the
    /// user owns is removed atomically.
    pub async fn clear(&self, user_id: i32, restaurant_id: Option<i32>) -> Result<u64, CartError> {
        match restaurant_id {
            Some(restaurant_id) => self.carts.clear_restaurant(user_id, restaurant_id).await,
            None => self.carts.clear_all(user_id).await,
        }
    }

    /// All of the user's carts grouped by restaurant, with per-cart
    /// subtotals and item counts.
    pub async fn list(&self, user_id: i32) -> Result<CartListView, CartError> {
        let rows = self.carts.list_rows(user_id).await?;
        let modifier_rows = self.carts.modifier_rows(user_id).await?;

        let mut modifiers_by_item: HashMap<i32, Vec<CartModifierView>> = HashMap::new();
        for row in modifier_rows {
            modifiers_by_item
                .entry(row.cart_item_id)
                .or_default()
                .push(CartModifierView {
                    modifier_option_id: row.modifier_option_id,
                    name: row.name,
                    price_delta: row.price_delta,
                });
        }

        let mut carts: Vec<RestaurantCartView> = Vec::new();
        for row in rows {
            if carts.last().map(|c| c.cart_id) != Some(row.cart_id) {
                carts.push(RestaurantCartView {
                    cart_id: row.cart_id,
                    restaurant_id: row.restaurant_id,
                    restaurant_name: row.restaurant_name.clone(),
                    items: Vec::new(),
                    subtotal: Decimal::ZERO,
                    item_count: 0,
                });
            }

            let cart = carts.last_mut().unwrap();
            let line_total = row.price_at_add * Decimal::from(row.quantity);
            cart.subtotal += line_total;
            cart.item_count += i64::from(row.quantity);
            cart.items.push(CartItemView {
                id: row.item_id,
                product_id: row.product_id,
                product_name: row.product_name,
                quantity: row.quantity,
                price_at_add: row.price_at_add,
                line_total,
                modifiers: modifiers_by_item.remove(&row.item_id).unwrap_or_default(),
            });
        }

        Ok(CartListView { carts })
    }
}

fn group_option_ids(rows: Vec<CartItemModifier>) -> HashMap<i32, Vec<i32>> {
    let mut map: HashMap<i32, Vec<i32>> = HashMap::new();
    for row in rows {
        map.entry(row.cart_item_id)
            .or_default()
            .push(row.modifier_option_id);
    }
    map
}

/// Check every selected option against the product's modifier groups and
/// enforce each group's selection bounds. Groups with a minimum above zero
/// must be satisfied even when nothing in them was selected.
fn validate_modifier_selection(
    product: &Product,
    groups: &[ModifierGroup],
    options: &[ModifierOption],
    requested_ids: &[i32],
) -> Result<(), CartError> {
    if options.len() != requested_ids.len() {
        return Err(CartError::InvalidModifiers(
            "One or more modifier options do not exist or are inactive".to_string(),
        ));
    }

    let group_index: HashMap<i32, &ModifierGroup> = groups.iter().map(|g| (g.id, g)).collect();

    let mut selected_per_group: HashMap<i32, i32> = HashMap::new();
    for option in options {
        let group = group_index.get(&option.modifier_group_id).ok_or_else(|| {
            CartError::InvalidModifiers(format!(
                "Option {} does not belong to product {}",
                option.id, product.id
            ))
        })?;

        if group.restaurant_id != product.restaurant_id {
            return Err(CartError::InvalidModifiers(format!(
                "Option {} belongs to another restaurant",
                option.id
            )));
        }

        *selected_per_group.entry(group.id).or_insert(0) += 1;
    }

    for group in groups {
        let selected = selected_per_group.get(&group.id).copied().unwrap_or(0);
        if selected < group.min_selection || selected > group.max_selection {
            return Err(CartError::InvalidModifiers(format!(
                "Group '{}' requires between {} and {} selections, got {}",
                group.name, group.min_selection, group.max_selection, selected
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product() -> Product {
        Product {
            id: 1,
            restaurant_id: 7,
            subcategory_id: 1,
            name: "Pizza Hawaiana".to_string(),
            description: None,
            price: dec!(150.00),
            is_available: true,
        }
    }

    fn group(id: i32, min: i32, max: i32) -> ModifierGroup {
        ModifierGroup {
            id,
            restaurant_id: 7,
            name: format!("Group {}", id),
            min_selection: min,
            max_selection: max,
        }
    }

    fn option(id: i32, group_id: i32) -> ModifierOption {
        ModifierOption {
            id,
            modifier_group_id: group_id,
            name: format!("Option {}", id),
            price_delta: dec!(15.00),
            is_active: true,
        }
    }

    #[test]
    fn test_same_option_set_ignores_order() {
        assert!(same_option_set(&[3, 1, 2], &[1, 2, 3]));
        assert!(same_option_set(&[], &[]));
        assert!(!same_option_set(&[1, 2], &[1, 3]));
        assert!(!same_option_set(&[1], &[1, 2]));
    }

    #[test]
    fn test_selection_within_bounds_passes() {
        let groups = vec![group(10, 0, 2)];
        let options = vec![option(100, 10), option(101, 10)];
        assert!(
            validate_modifier_selection(&product(), &groups, &options, &[100, 101]).is_ok()
        );
    }

    #[test]
    fn test_required_group_must_be_satisfied() {
        let groups = vec![group(10, 1, 2)];
        let result = validate_modifier_selection(&product(), &groups, &[], &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_selection_above_max_is_rejected() {
        let groups = vec![group(10, 0, 1)];
        let options = vec![option(100, 10), option(101, 10)];
        let result = validate_modifier_selection(&product(), &groups, &options, &[100, 101]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let groups = vec![group(10, 0, 2)];
        // Requested two options but only one resolved as active
        let options = vec![option(100, 10)];
        let result = validate_modifier_selection(&product(), &groups, &options, &[100, 999]);
        assert!(result.is_err());
    }

    #[test]
    fn test_option_from_foreign_group_is_rejected() {
        let groups = vec![group(10, 0, 2)];
        let options = vec![option(100, 55)];
        let result = validate_modifier_selection(&product(), &groups, &options, &[100]);
        assert!(result.is_err());
    }

    #[test]
    fn test_option_from_other_restaurant_is_rejected() {
        let mut foreign = group(10, 0, 2);
        foreign.restaurant_id = 8;
        let options = vec![option(100, 10)];
        let result = validate_modifier_selection(&product(), &[foreign], &options, &[100]);
        assert!(result.is_err());
    }
}
