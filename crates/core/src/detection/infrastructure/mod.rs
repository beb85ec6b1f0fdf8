pub mod model_detector_factory;
pub mod onnx_blazeface_detector;
pub mod seeta_cascade_detector;
