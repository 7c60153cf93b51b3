// ABOUTME: Executes model-requested function calls against the tool server sequentially
// ABOUTME: Detects the customer-verification side effect and updates session state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Tool Invocation Bridge
//!
//! Turns a batch of model [`FunctionCall`]s into [`ToolOutcome`]s. Calls are
//! executed strictly in request order, one at a time; a failure never aborts
//! the batch. Transport failures are folded into the outcome's result string
//! so the model can read them and decide what to do next.
//!
//! The bridge is also where customer verification happens: it is a side
//! effect of observing a successful `verify_customer_pin` result, detected by
//! [`is_verification_success`]. No other code path may flip the flag.

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::constants::markers;
use crate::llm::{empty_arguments, FunctionCall};
use crate::mcp::McpClient;
use crate::session::VerificationState;

/// Name of the tool whose success verifies a customer
const VERIFY_TOOL: &str = "verify_customer_pin";

/// Record of one executed tool call
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Tool that was invoked
    pub tool_name: String,
    /// Arguments it was invoked with, post-normalization
    pub arguments: Value,
    /// Textual result (tool output, tool error or folded transport error)
    pub result: String,
    /// Which orchestration round produced this call (1-based)
    pub round: usize,
}

/// Decide whether a tool result proves a successful customer verification
///
/// True exactly when the tool is `verify_customer_pin` and the result text
/// contains the customer-record marker. Failed verifications ("Error: ..."),
/// other tools whose output happens to mention a customer id, and transport
/// errors all return false.
#[must_use]
pub fn is_verification_success(tool_name: &str, result: &str) -> bool {
    tool_name == VERIFY_TOOL && result.contains(markers::VERIFICATION_MARKER)
}

/// Coerce model-supplied arguments into a JSON object
///
/// Some models emit `null` or scalar arguments for zero-parameter tools;
/// the server expects an object.
#[must_use]
pub fn normalize_arguments(args: Value) -> Value {
    if args.is_object() {
        args
    } else {
        empty_arguments()
    }
}

/// Execute a batch of function calls in order and apply verification effects
///
/// Each call yields exactly one outcome. A transport failure becomes an
/// `"Error calling tool: ..."` result string; execution continues with the
/// next call regardless.
#[instrument(skip(client, calls, verification), fields(count = calls.len(), round))]
pub async fn execute_function_calls(
    client: &McpClient,
    calls: &[FunctionCall],
    verification: &mut VerificationState,
    round: usize,
) -> Vec<ToolOutcome> {
    let mut outcomes = Vec::with_capacity(calls.len());

    for call in calls {
        let arguments = normalize_arguments(call.args.clone());
        debug!(tool = %call.name, "executing tool call");

        let result = match client.call_tool(&call.name, arguments.clone()).await {
            Ok(text) => text,
            Err(e) => format!("Error calling tool: {e}"),
        };

        if is_verification_success(&call.name, &result) {
            info!("customer verified for this session");
            verification.mark_verified(result.clone());
        }

        outcomes.push(ToolOutcome {
            tool_name: call.name.clone(),
            arguments,
            result,
            round,
        });
    }

    outcomes
}
