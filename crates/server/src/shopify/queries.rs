//! GraphQL query definitions for the Shopify Admin API.
//!
//! The COA query has a fixed shape, so its request and response types are
//! written out by hand and plugged into `graphql_client` through a manual
//! [`GraphQLQuery`] impl instead of schema codegen.

use graphql_client::{GraphQLQuery, QueryBody};

/// Page of COA metaobjects, newest update first.
///
/// The pagination cursor is always passed as the `$after` variable.
pub struct GetCoaMetaobjects;

impl GraphQLQuery for GetCoaMetaobjects {
    type Variables = get_coa_metaobjects::Variables;
    type ResponseData = get_coa_metaobjects::ResponseData;

    fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
        QueryBody {
            variables,
            query: get_coa_metaobjects::QUERY,
            operation_name: get_coa_metaobjects::OPERATION_NAME,
        }
    }
}

pub mod get_coa_metaobjects {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "GetCoaMetaobjects";

    pub const QUERY: &str = r#"query GetCoaMetaobjects($type: String!, $first: Int!, $after: String, $sortKey: String, $reverse: Boolean) {
  metaobjects(type: $type, first: $first, after: $after, sortKey: $sortKey, reverse: $reverse) {
    edges {
      node {
        id
        date: field(key: "date") { value }
        product: field(key: "product") {
          reference { __typename ... on Product { title } }
        }
        batchNumber: field(key: "batch_number") { value }
        pdfLink: field(key: "pdf") {
          value
          reference { __typename ... on GenericFile { url } }
        }
        bestByDate: field(key: "best_by_date") { value }
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}"#;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        #[serde(rename = "type")]
        pub type_: String,
        pub first: i64,
        pub after: Option<String>,
        pub sort_key: Option<String>,
        pub reverse: Option<bool>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub metaobjects: Metaobjects,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Metaobjects {
        #[serde(default)]
        pub edges: Vec<MetaobjectEdge>,
        pub page_info: PageInfo,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct MetaobjectEdge {
        pub node: CoaNode,
    }

    /// One metaobject with each COA field under its alias.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CoaNode {
        pub id: String,
        pub date: Option<ValueField>,
        pub product: Option<ReferenceField>,
        pub batch_number: Option<ValueField>,
        pub pdf_link: Option<ReferenceField>,
        pub best_by_date: Option<ValueField>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ValueField {
        pub value: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ReferenceField {
        #[serde(default)]
        pub value: Option<String>,
        pub reference: Option<Reference>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(tag = "__typename")]
    pub enum Reference {
        Product {
            title: String,
        },
        GenericFile {
            url: Option<String>,
        },
        #[serde(other)]
        Other,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageInfo {
        pub has_next_page: bool,
        pub end_cursor: Option<String>,
    }
}
