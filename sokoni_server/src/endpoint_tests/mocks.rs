use mockall::mock;
use sokoni_order_engine::{
    db_types::{
        Adjustment,
        NewOrder,
        NewProduct,
        NewUser,
        Order,
        OrderItem,
        OrderStatus,
        PaymentResult,
        Product,
        Roles,
        User,
    },
    order_objects::{FulfillmentReview, FullOrder, OrderChanged, OrderQueryFilter},
    traits::{
        AuthApiError,
        AuthManagement,
        CatalogApiError,
        CatalogManagement,
        OrderManagement,
        OrderManagementError,
        OrderQuery,
        OrderQueryError,
    },
};

mock! {
    pub OrderStore {}

    impl Clone for OrderStore {
        fn clone(&self) -> Self;
    }

    impl OrderQuery for OrderStore {
        async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderQueryError>;
        async fn fetch_full_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderQueryError>;
        async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderQueryError>;
        async fn fetch_adjustments(&self, order_id: i64) -> Result<Vec<Adjustment>, OrderQueryError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError>;
        async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError>;
        async fn fetch_orders_for_rider(&self, rider_id: i64) -> Result<Vec<Order>, OrderQueryError>;
    }

    impl OrderManagement for OrderStore {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, OrderManagementError>;
        async fn update_order(
            &self,
            order_id: i64,
            new_status: Option<OrderStatus>,
            rider_id: Option<i64>,
        ) -> Result<OrderChanged, OrderManagementError>;
        async fn assign_rider(&self, order_id: i64, rider_id: i64) -> Result<OrderChanged, OrderManagementError>;
        async fn add_order_item(
            &self,
            order_id: i64,
            product_id: i64,
            quantity: i64,
            note: Option<String>,
            admin_id: i64,
        ) -> Result<FullOrder, OrderManagementError>;
        async fn update_item_quantity(
            &self,
            order_id: i64,
            item_id: i64,
            new_quantity: i64,
            note: Option<String>,
            admin_id: i64,
        ) -> Result<FullOrder, OrderManagementError>;
        async fn remove_order_item(
            &self,
            order_id: i64,
            item_id: i64,
            note: Option<String>,
            admin_id: i64,
        ) -> Result<FullOrder, OrderManagementError>;
        async fn apply_fulfillment_review(
            &self,
            order_id: i64,
            review: FulfillmentReview,
            admin_id: i64,
        ) -> Result<FullOrder, OrderManagementError>;
        async fn process_payment_update(
            &self,
            order_id: i64,
            result: PaymentResult,
            payload: &str,
        ) -> Result<OrderChanged, OrderManagementError>;
    }
}

mock! {
    pub AuthStore {}

    impl AuthManagement for AuthStore {
        async fn create_user(&self, user: NewUser) -> Result<User, AuthApiError>;
        async fn fetch_user_by_phone(&self, phone: &str) -> Result<Option<User>, AuthApiError>;
        async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError>;
        async fn assign_roles(&self, user_id: i64, roles: &Roles) -> Result<(), AuthApiError>;
    }
}

mock! {
    pub CatalogStore {}

    impl CatalogManagement for CatalogStore {
        async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError>;
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogApiError>;
        async fn fetch_products(&self) -> Result<Vec<Product>, CatalogApiError>;
    }
}
