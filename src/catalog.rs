// ABOUTME: Canonical catalog of the eight remote support tools the model may call
// ABOUTME: Single source of truth exported into each provider's schema dialect
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Tool Catalog
//!
//! Declarations for every operation the tool server exposes: three product
//! lookups, two customer operations and three order operations. Providers
//! never define their own schemas; Gemini consumes [`gemini_toolset`]
//! directly and the OpenAI-compatible adapter derives its wrapper format from
//! the same declarations.
//!
//! Descriptions double as model-facing usage guidance, so wording changes
//! here change model behavior.

use serde_json::json;

use crate::llm::{FunctionDeclaration, Tool};

/// Declarations for product browsing and lookup
#[must_use]
pub fn product_tools() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: "list_products".into(),
            description: "List products with optional filters. Use this to browse inventory \
                by category or check stock levels."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Filter by category (e.g., 'Computers', 'Monitors', 'Printers', 'Accessories', 'Networking')"
                    },
                    "is_active": {
                        "type": "boolean",
                        "description": "Filter by active status (true/false)"
                    }
                }
            })),
        },
        FunctionDeclaration {
            name: "get_product".into(),
            description: "Get detailed product information by SKU. Use this to get current \
                price, check inventory for specific item, or verify product details."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "sku": {
                        "type": "string",
                        "description": "Product SKU (e.g., 'COM-0001', 'MON-0054')"
                    }
                },
                "required": ["sku"]
            })),
        },
        FunctionDeclaration {
            name: "search_products".into(),
            description: "Search products by name or description. Use this for natural \
                language product lookup."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search term (case-insensitive, partial match)"
                    }
                },
                "required": ["query"]
            })),
        },
    ]
}

/// Declarations for customer lookup and identity verification
#[must_use]
pub fn customer_tools() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: "get_customer".into(),
            description: "Get customer information by ID. Use this to look up customer \
                details or verify shipping address."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "customer_id": {
                        "type": "string",
                        "description": "Customer UUID"
                    }
                },
                "required": ["customer_id"]
            })),
        },
        FunctionDeclaration {
            name: "verify_customer_pin".into(),
            description: "Verify customer identity with email and PIN. Use this to \
                authenticate customer before order placement."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "email": {
                        "type": "string",
                        "description": "Customer email address"
                    },
                    "pin": {
                        "type": "string",
                        "description": "4-digit PIN code"
                    }
                },
                "required": ["email", "pin"]
            })),
        },
    ]
}

/// Declarations for order history and order placement
#[must_use]
pub fn order_tools() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: "list_orders".into(),
            description: "List orders with optional filters. Use this to view customer \
                order history or track pending orders."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "customer_id": {
                        "type": "string",
                        "description": "Filter by customer UUID"
                    },
                    "status": {
                        "type": "string",
                        "description": "Filter by status (draft|submitted|approved|fulfilled|cancelled)"
                    }
                }
            })),
        },
        FunctionDeclaration {
            name: "get_order".into(),
            description: "Get detailed order information including items. Use this to view \
                order details or check order contents."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "order_id": {
                        "type": "string",
                        "description": "Order UUID"
                    }
                },
                "required": ["order_id"]
            })),
        },
        FunctionDeclaration {
            name: "create_order".into(),
            description: "Create a new order with items. Customer must be verified first. \
                Order starts in 'submitted' status."
                .into(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "customer_id": {
                        "type": "string",
                        "description": "Customer UUID (must be verified first)"
                    },
                    "items": {
                        "type": "array",
                        "description": "List of items to order",
                        "items": {
                            "type": "object",
                            "properties": {
                                "sku": {"type": "string", "description": "Product SKU"},
                                "quantity": {"type": "integer", "description": "Quantity (must be > 0)"},
                                "unit_price": {"type": "string", "description": "Price as string"},
                                "currency": {"type": "string", "description": "Currency code (default: USD)"}
                            },
                            "required": ["sku", "quantity", "unit_price"]
                        }
                    }
                },
                "required": ["customer_id", "items"]
            })),
        },
    ]
}

/// The complete catalog: every operation the model may request
#[must_use]
pub fn support_tool_catalog() -> Vec<FunctionDeclaration> {
    let mut declarations = product_tools();
    declarations.extend(customer_tools());
    declarations.extend(order_tools());
    declarations
}

/// The catalog wrapped as a single Gemini-style toolset
#[must_use]
pub fn gemini_toolset() -> Vec<Tool> {
    vec![Tool {
        function_declarations: support_tool_catalog(),
    }]
}
