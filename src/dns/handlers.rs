use crate::config::SharedConfig;
use crate::dns::zone::ZoneStore;
use crate::error::Error;
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::net::IpAddr;
use std::str::FromStr;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::error;
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::{Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

#[derive(Clone)]
pub struct Handler {
    config: SharedConfig,
    zone: ZoneStore,
}

lazy_static! {
    static ref SERIAL_FORMATTER: &'static [time::format_description::FormatItem<'static>] =
        format_description!(version = 2, "[year][month][day]");
}

impl Handler {
    pub(super) fn new(config: SharedConfig, zone: ZoneStore) -> Self {
        Handler { config, zone }
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        // If it isn't a query, return NOTIMPL.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.handle_notimpl(request, response).await;
        }

        // Otherwise handle by query type, or return NOTIMPL.
        match request.query().query_type() {
            RecordType::A => self.handle_request_addr(request, response, false).await,
            RecordType::AAAA => self.handle_request_addr(request, response, true).await,
            RecordType::SOA => self.handle_request_soa(request, response).await,
            RecordType::NS => self.handle_request_ns(request, response).await,
            _ => self.handle_notimpl(request, response).await,
        }
    }

    async fn handle_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    /// A and AAAA share a path: a registered name answers with records of the
    /// requested family (possibly none), an unregistered one gets NXDOMAIN.
    async fn handle_request_addr<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
        want_v6: bool,
    ) -> Result<ResponseInfo, Error> {
        let query_name = request.query().name();
        match self.zone.lookup(query_name).await {
            None => self.send_nxdomain(request, response_handle).await,
            Some(ip) => {
                let rdata = match (ip, want_v6) {
                    (IpAddr::V4(v4), false) => vec![RData::A(v4)],
                    (IpAddr::V6(v6), true) => vec![RData::AAAA(v6)],
                    _ => vec![],
                };
                self.send_auth_resp(request, response_handle, rdata).await
            }
        }
    }

    async fn handle_request_soa<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let query_name = request.query().name();
        if *query_name != self.config.domain {
            return self.send_nxdomain(request, response_handle).await;
        }

        // NB: unwraps are safe: known date format producing values that will always parse as u32.
        let serial: u32 = OffsetDateTime::now_utc()
            .format(&SERIAL_FORMATTER)
            .unwrap()
            .parse()
            .unwrap();
        let ns_admin = self.ns_admin()?;
        // See RIPE 203[0] for recommended values.
        // [0]: https://www.ripe.net/publications/docs/ripe-203
        let soa_rdata = RData::SOA(SOA::new(
            self.config.ns_domain.clone().into(),
            ns_admin,
            serial,
            86_400,    // 24 hrs.
            7_200,     // 2 hours.
            3_600_000, // 1000 hours.
            172_800,   // 2 days.
        ));
        self.send_auth_resp(request, response_handle, vec![soa_rdata])
            .await
    }

    async fn handle_request_ns<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let query_name = request.query().name();
        if *query_name != self.config.domain {
            return self.send_nxdomain(request, response_handle).await;
        }
        let ns_rdata = vec![RData::NS((&self.config.ns_domain).into())];
        self.send_auth_resp(request, response_handle, ns_rdata).await
    }

    fn ns_admin(&self) -> Result<Name, Error> {
        Ok(Name::from_str(&self.sanitized_ns_admin())?)
    }

    fn sanitized_ns_admin(&self) -> Cow<str> {
        match self.config.ns_admin.split_once('@') {
            Some((user, domain)) => {
                let user = user.replace('.', "\\.");
                Cow::Owned(format!("{user}.{domain}"))
            }
            _ => Cow::Borrowed(&self.config.ns_admin),
        }
    }

    async fn send_auth_resp<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        rdata: Vec<RData>,
    ) -> Result<ResponseInfo, Error> {
        let records: Vec<Record> = rdata
            .iter()
            .map(|rd| {
                Record::from_rdata(
                    request.query().name().into(),
                    self.config.dns_ttl,
                    rd.clone(),
                )
            })
            .collect();
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }

    async fn send_nxdomain<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_response_code(ResponseCode::NXDomain);
        let response = builder.build_no_records(header);
        Ok(response_handle.send_response(response).await?)
    }
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(error) => {
                error!("error in RequestHandler: {:?}", error);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
