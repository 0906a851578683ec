use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{inventory_validator, logout_guard, AuthUser},
    db::log_activity,
    models::{BranchStockRow, PurchaseOrderRow, StockTransferRow, PO_DRAFT, TRANSFER_PENDING},
    services::{branches, inventory},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct StockView {
    product_name: String,
    unit: String,
    category: String,
    retail_price: String,
    reorder_level: i64,
    quantity: i64,
    low: bool,
}

#[derive(Clone, Debug)]
struct SupplierView {
    id: String,
    name: String,
    contact_person: String,
    phone: String,
    email: String,
}

#[derive(Clone, Debug)]
struct ProductOption {
    id: String,
    name: String,
}

#[derive(Clone, Debug)]
struct SupplierOption {
    id: String,
    name: String,
}

#[derive(Clone, Debug)]
struct OrderView {
    id: String,
    supplier_name: String,
    status: String,
    created_at: String,
    is_draft: bool,
    is_open: bool,
}

#[derive(Clone, Debug)]
struct OrderLineView {
    product_name: String,
    quantity: i64,
    unit_cost: String,
}

#[derive(Clone, Debug)]
struct TransferView {
    id: String,
    from_branch: String,
    to_branch: String,
    product_name: String,
    quantity: i64,
    status: String,
    is_pending: bool,
}

#[derive(Clone, Debug)]
struct BranchOption {
    id: String,
    name: String,
}

#[derive(Template)]
#[template(path = "inventory_dashboard.html")]
struct InventoryDashboardTemplate {
    controller_name: String,
    branch_name: String,
    product_count: usize,
    low_stock: Vec<StockView>,
}

#[derive(Template)]
#[template(path = "inventory_suppliers.html")]
struct InventorySuppliersTemplate {
    suppliers: Vec<SupplierView>,
}

#[derive(Template)]
#[template(path = "inventory_products.html")]
struct InventoryProductsTemplate {
    branch_id: String,
    stock: Vec<StockView>,
    products: Vec<ProductOption>,
    suppliers: Vec<SupplierOption>,
}

#[derive(Template)]
#[template(path = "inventory_orders.html")]
struct InventoryOrdersTemplate {
    orders: Vec<OrderView>,
    suppliers: Vec<SupplierOption>,
    products: Vec<ProductOption>,
}

#[derive(Template)]
#[template(path = "inventory_order_detail.html")]
struct InventoryOrderDetailTemplate {
    order: OrderView,
    lines: Vec<OrderLineView>,
    products: Vec<ProductOption>,
}

#[derive(Template)]
#[template(path = "inventory_transfers.html")]
struct InventoryTransfersTemplate {
    transfers: Vec<TransferView>,
    branches: Vec<BranchOption>,
    products: Vec<ProductOption>,
}

#[derive(Deserialize)]
struct SupplierForm {
    name: String,
    contact_person: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
}

#[derive(Deserialize)]
struct ProductForm {
    name: String,
    category: Option<String>,
    unit: String,
    supplier_id: Option<String>,
    retail_price: String,
    reorder_level: String,
}

#[derive(Deserialize)]
struct AdjustForm {
    product_id: String,
    delta: String,
}

#[derive(Deserialize)]
struct SalonUseForm {
    product_id: String,
    quantity: String,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct OrderForm {
    supplier_id: String,
    product_id: String,
    quantity: String,
    unit_cost: String,
}

#[derive(Deserialize)]
struct OrderLineForm {
    product_id: String,
    quantity: String,
    unit_cost: String,
}

#[derive(Deserialize)]
struct TransferForm {
    to_branch_id: String,
    product_id: String,
    quantity: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/inventory")
            .wrap(HttpAuthentication::basic(inventory_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(
                web::resource("/suppliers")
                    .route(web::get().to(list_suppliers))
                    .route(web::post().to(create_supplier)),
            )
            .service(web::resource("/suppliers/{id}").route(web::post().to(update_supplier)))
            .service(
                web::resource("/products")
                    .route(web::get().to(list_products))
                    .route(web::post().to(create_product)),
            )
            .service(web::resource("/products/adjust").route(web::post().to(adjust_stock)))
            .service(web::resource("/products/use").route(web::post().to(record_salon_use)))
            .service(
                web::resource("/orders")
                    .route(web::get().to(list_orders))
                    .route(web::post().to(create_order)),
            )
            .service(web::resource("/orders/{id}").route(web::get().to(order_detail)))
            .service(web::resource("/orders/{id}/lines").route(web::post().to(add_order_line)))
            .service(web::resource("/orders/{id}/ordered").route(web::post().to(mark_ordered)))
            .service(web::resource("/orders/{id}/receive").route(web::post().to(receive_order)))
            .service(web::resource("/orders/{id}/cancel").route(web::post().to(cancel_order)))
            .service(
                web::resource("/transfers")
                    .route(web::get().to(list_transfers))
                    .route(web::post().to(request_transfer)),
            )
            .service(web::resource("/transfers/{id}/complete").route(web::post().to(complete_transfer)))
            .service(web::resource("/transfers/{id}/cancel").route(web::post().to(cancel_transfer))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/inventory/dashboard"))
        .finish()
}

async fn controller_branch(
    state: &web::Data<AppState>,
    auth: &AuthUser,
) -> Option<crate::models::BranchRow> {
    if let Some(branch_id) = &auth.branch_id {
        return branches::branch_by_id(&state.db, branch_id).await.ok()?;
    }
    branches::all_branches(&state.db)
        .await
        .ok()?
        .into_iter()
        .next()
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let stock = inventory::branch_products(&state.db, &branch.id)
        .await
        .unwrap_or_default();
    let low = inventory::low_stock(&state.db, &branch.id)
        .await
        .unwrap_or_default();

    Ok(render(InventoryDashboardTemplate {
        controller_name: auth.display_name.clone(),
        branch_name: branch.name,
        product_count: stock.len(),
        low_stock: low.iter().map(stock_view).collect(),
    }))
}

async fn list_suppliers(state: web::Data<AppState>) -> Result<HttpResponse> {
    let suppliers = inventory::suppliers(&state.db).await.unwrap_or_default();
    Ok(render(InventorySuppliersTemplate {
        suppliers: suppliers
            .iter()
            .map(|row| SupplierView {
                id: row.id.clone(),
                name: row.name.clone(),
                contact_person: row.contact_person.clone().unwrap_or_default(),
                phone: row.phone.clone().unwrap_or_default(),
                email: row.email.clone().unwrap_or_default(),
            })
            .collect(),
    }))
}

async fn create_supplier(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<SupplierForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    if form.name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().body("Supplier name is required"));
    }

    let supplier = inventory::create_supplier(
        &state.db,
        inventory::NewSupplier {
            name: form.name.trim().to_string(),
            contact_person: form.contact_person.filter(|v| !v.trim().is_empty()),
            phone: form.phone.filter(|v| !v.trim().is_empty()),
            email: form.email.filter(|v| !v.trim().is_empty()),
            address: form.address.filter(|v| !v.trim().is_empty()),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "supplier_created",
        &format!("{} added supplier {}.", auth.display_name, supplier.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/suppliers"))
        .finish())
}

async fn update_supplier(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<SupplierForm>,
) -> Result<HttpResponse> {
    let supplier_id = path.into_inner();
    let form = form.into_inner();
    if form.name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().body("Supplier name is required"));
    }

    let updated = inventory::update_supplier(
        &state.db,
        &supplier_id,
        inventory::NewSupplier {
            name: form.name.trim().to_string(),
            contact_person: form.contact_person.filter(|v| !v.trim().is_empty()),
            phone: form.phone.filter(|v| !v.trim().is_empty()),
            email: form.email.filter(|v| !v.trim().is_empty()),
            address: form.address.filter(|v| !v.trim().is_empty()),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(updated) = updated else {
        return Ok(HttpResponse::NotFound().body("Supplier not found"));
    };

    log_activity(
        &state.db,
        "supplier_updated",
        &format!("{} updated supplier {}.", auth.display_name, updated.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/suppliers"))
        .finish())
}

async fn list_products(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let stock = inventory::branch_products(&state.db, &branch.id)
        .await
        .unwrap_or_default();
    let products = inventory::master_products(&state.db).await.unwrap_or_default();
    let suppliers = inventory::suppliers(&state.db).await.unwrap_or_default();

    Ok(render(InventoryProductsTemplate {
        branch_id: branch.id,
        stock: stock.iter().map(stock_view).collect(),
        products: products
            .iter()
            .map(|row| ProductOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
        suppliers: suppliers
            .iter()
            .map(|row| SupplierOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
    }))
}

async fn create_product(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ProductForm>,
) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    if form.name.trim().is_empty() || form.unit.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().body("Product name and unit are required"));
    }
    let retail_price = form.retail_price.trim().parse::<f64>().unwrap_or(0.0);
    let reorder_level = form.reorder_level.trim().parse::<i64>().unwrap_or(0);

    let product = inventory::create_master_product(
        &state.db,
        inventory::NewProduct {
            name: form.name.trim().to_string(),
            category: form.category.filter(|v| !v.trim().is_empty()),
            unit: form.unit.trim().to_string(),
            description: None,
            supplier_id: form.supplier_id.filter(|v| !v.trim().is_empty()),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    inventory::link_branch_product(&state.db, &branch.id, &product.id, retail_price, reorder_level)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "product_created",
        &format!("{} added product {} at {}.", auth.display_name, product.name, branch.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/products"))
        .finish())
}

async fn adjust_stock(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<AdjustForm>,
) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    let Ok(delta) = form.delta.trim().parse::<i64>() else {
        return Ok(HttpResponse::BadRequest().body("Adjustment must be a whole number"));
    };

    let quantity = inventory::adjust_stock(&state.db, &branch.id, &form.product_id, delta)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "stock_adjusted",
        &format!(
            "{} adjusted product {} by {delta} (now {quantity}).",
            auth.display_name, form.product_id
        ),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/products"))
        .finish())
}

async fn record_salon_use(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<SalonUseForm>,
) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    let quantity = form.quantity.trim().parse::<i64>().unwrap_or(0);
    if quantity <= 0 {
        return Ok(HttpResponse::BadRequest().body("Quantity must be positive"));
    }

    inventory::record_salon_use(
        &state.db,
        &branch.id,
        &form.product_id,
        quantity,
        &auth.id,
        form.notes.as_deref().filter(|n| !n.trim().is_empty()),
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/products"))
        .finish())
}

async fn list_orders(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let orders = inventory::purchase_orders_by_branch(&state.db, &branch.id)
        .await
        .unwrap_or_default();
    let suppliers = inventory::suppliers(&state.db).await.unwrap_or_default();
    let products = inventory::master_products(&state.db).await.unwrap_or_default();

    Ok(render(InventoryOrdersTemplate {
        orders: orders.iter().map(order_view).collect(),
        suppliers: suppliers
            .iter()
            .map(|row| SupplierOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
        products: products
            .iter()
            .map(|row| ProductOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
    }))
}

async fn create_order(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<OrderForm>,
) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    let quantity = form.quantity.trim().parse::<i64>().unwrap_or(0);
    let unit_cost = form.unit_cost.trim().parse::<f64>().unwrap_or(-1.0);
    if quantity <= 0 || unit_cost < 0.0 {
        return Ok(HttpResponse::BadRequest().body("Invalid order line"));
    }

    let order = inventory::create_purchase_order(
        &state.db,
        &branch.id,
        &form.supplier_id,
        &auth.id,
        vec![inventory::OrderLine {
            product_id: form.product_id,
            quantity,
            unit_cost,
        }],
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "purchase_order_created",
        &format!("{} drafted purchase order {}.", auth.display_name, order.id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/inventory/orders/{}", order.id)))
        .finish())
}

async fn order_detail(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    let order = inventory::purchase_order_by_id(&state.db, &order_id)
        .await
        .unwrap_or(None);
    let Some(order) = order else {
        return Ok(HttpResponse::NotFound().body("Purchase order not found"));
    };

    let lines = inventory::order_details(&state.db, &order_id)
        .await
        .unwrap_or_default();
    let products = inventory::master_products(&state.db).await.unwrap_or_default();

    Ok(render(InventoryOrderDetailTemplate {
        order: order_view(&order),
        lines: lines
            .iter()
            .map(|line| OrderLineView {
                product_name: line
                    .product_name
                    .clone()
                    .unwrap_or_else(|| line.product_id.clone()),
                quantity: line.quantity,
                unit_cost: format!("{:.2}", line.unit_cost),
            })
            .collect(),
        products: products
            .iter()
            .map(|row| ProductOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
    }))
}

async fn add_order_line(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<OrderLineForm>,
) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    let form = form.into_inner();

    let order = inventory::purchase_order_by_id(&state.db, &order_id)
        .await
        .unwrap_or(None);
    let Some(order) = order else {
        return Ok(HttpResponse::NotFound().body("Purchase order not found"));
    };
    if order.status != PO_DRAFT {
        return Ok(HttpResponse::BadRequest().body("Only draft orders can be edited"));
    }

    let quantity = form.quantity.trim().parse::<i64>().unwrap_or(0);
    let unit_cost = form.unit_cost.trim().parse::<f64>().unwrap_or(-1.0);
    if quantity <= 0 || unit_cost < 0.0 {
        return Ok(HttpResponse::BadRequest().body("Invalid order line"));
    }

    inventory::add_order_line(
        &state.db,
        &order_id,
        inventory::OrderLine {
            product_id: form.product_id,
            quantity,
            unit_cost,
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/inventory/orders/{order_id}")))
        .finish())
}

async fn mark_ordered(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    inventory::mark_ordered(&state.db, &order_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/inventory/orders/{order_id}")))
        .finish())
}

async fn receive_order(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    let order = inventory::receive_purchase_order(&state.db, &order_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(order) = order else {
        return Ok(HttpResponse::NotFound().body("Purchase order not found"));
    };

    log_activity(
        &state.db,
        "purchase_order_received",
        &format!("{} received purchase order {}.", auth.display_name, order.id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/inventory/orders/{order_id}")))
        .finish())
}

async fn cancel_order(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    inventory::cancel_purchase_order(&state.db, &order_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/orders"))
        .finish())
}

async fn list_transfers(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let transfers = inventory::transfers_for_branch(&state.db, &branch.id)
        .await
        .unwrap_or_default();
    let branch_rows = branches::all_branches(&state.db).await.unwrap_or_default();
    let products = inventory::master_products(&state.db).await.unwrap_or_default();

    let mut views = Vec::with_capacity(transfers.len());
    for transfer in &transfers {
        views.push(transfer_view(&state, transfer).await);
    }

    Ok(render(InventoryTransfersTemplate {
        transfers: views,
        branches: branch_rows
            .iter()
            .filter(|row| row.id != branch.id)
            .map(|row| BranchOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
        products: products
            .iter()
            .map(|row| ProductOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
    }))
}

async fn request_transfer(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<TransferForm>,
) -> Result<HttpResponse> {
    let Some(branch) = controller_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    let quantity = form.quantity.trim().parse::<i64>().unwrap_or(0);
    if quantity <= 0 {
        return Ok(HttpResponse::BadRequest().body("Quantity must be positive"));
    }

    inventory::request_transfer(
        &state.db,
        &branch.id,
        &form.to_branch_id,
        &form.product_id,
        quantity,
        &auth.id,
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/transfers"))
        .finish())
}

async fn complete_transfer(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let transfer_id = path.into_inner();
    match inventory::complete_transfer(&state.db, &transfer_id).await {
        Ok(Some(_)) => {
            log_activity(
                &state.db,
                "transfer_completed",
                &format!("{} completed stock transfer {}.", auth.display_name, transfer_id),
                Some(&auth.id),
                None,
            )
            .await;
            Ok(HttpResponse::SeeOther()
                .append_header((header::LOCATION, "/inventory/transfers"))
                .finish())
        }
        Ok(None) => Ok(HttpResponse::NotFound().body("Transfer not found")),
        Err(err) => Ok(HttpResponse::BadRequest().body(err.to_string())),
    }
}

async fn cancel_transfer(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let transfer_id = path.into_inner();
    inventory::cancel_transfer(&state.db, &transfer_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/inventory/transfers"))
        .finish())
}

fn stock_view(row: &BranchStockRow) -> StockView {
    StockView {
        product_name: row.product_name.clone(),
        unit: row.unit.clone(),
        category: row.category.clone().unwrap_or_default(),
        retail_price: format!("{:.2}", row.retail_price),
        reorder_level: row.reorder_level,
        quantity: row.quantity,
        low: row.quantity <= row.reorder_level,
    }
}

fn order_view(row: &PurchaseOrderRow) -> OrderView {
    OrderView {
        id: row.id.clone(),
        supplier_name: row
            .supplier_name
            .clone()
            .unwrap_or_else(|| row.supplier_id.clone()),
        status: row.status.clone(),
        created_at: row.created_at.clone(),
        is_draft: row.status == PO_DRAFT,
        is_open: row.status == PO_DRAFT || row.status == crate::models::PO_ORDERED,
    }
}

async fn transfer_view(state: &web::Data<AppState>, row: &StockTransferRow) -> TransferView {
    let from_branch = branches::branch_by_id(&state.db, &row.from_branch_id)
        .await
        .unwrap_or(None)
        .map(|b| b.name)
        .unwrap_or_else(|| row.from_branch_id.clone());
    let to_branch = branches::branch_by_id(&state.db, &row.to_branch_id)
        .await
        .unwrap_or(None)
        .map(|b| b.name)
        .unwrap_or_else(|| row.to_branch_id.clone());
    let product_name = sqlx::query_scalar::<_, String>("SELECT name FROM master_products WHERE id = ?")
        .bind(&row.product_id)
        .fetch_optional(&state.db)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| row.product_id.clone());

    TransferView {
        id: row.id.clone(),
        from_branch,
        to_branch,
        product_name,
        quantity: row.quantity,
        status: row.status.clone(),
        is_pending: row.status == TRANSFER_PENDING,
    }
}
