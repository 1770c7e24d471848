//! UEFI HTTP client

use crate::client::HttpClient;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::protocol::uefi::ProtocolManager;
use crate::types::ProgressCallback;

pub struct UefiHttpClient {
    protocol_manager: ProtocolManager,
}

impl UefiHttpClient {
    pub fn new(/* boot_services */) -> Result<Self> {
        // TODO: Initialize UEFI HTTP client
        // 1. Create protocol manager
        // 2. Set up HTTP configuration
        // 3. Prepare for requests
        todo!("Implement UefiHttpClient::new")
    }
}

impl HttpClient for UefiHttpClient {
    fn request(&mut self, _request: &Request) -> Result<Response> {
        // TODO: Execute HTTP request via UEFI protocol
        // 1. Convert Request to UEFI format
        // 2. Call UEFI HTTP protocol
        // 3. Wait for response (async -> sync)
        // 4. Parse response
        // 5. Return Response
        todo!("Implement request")
    }

    fn request_with_progress(
        &mut self,
        _request: &Request,
        _progress: ProgressCallback,
    ) -> Result<Response> {
        // TODO: Execute with progress callbacks
        // 1. Same as request()
        // 2. Call progress() as data arrives
        todo!("Implement request_with_progress")
    }

    fn is_ready(&self) -> bool {
        // TODO: Check if protocols are initialized
        false
    }
}
